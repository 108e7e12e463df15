// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Object identifiers (spec §3): an ordered sequence of non-negative 32-bit
//! sub-identifiers, length 2..128, lexicographically ordered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PriotError;

pub const MIN_OID_LEN: usize = 2;
pub const MAX_OID_LEN: usize = 128;

/// An object identifier: `1.3.6.1.2.1.1.3.0`-style sub-identifier sequence.
///
/// Ordering is derivable lexicographic `Ord` over the sub-identifier
/// slice, which is exactly the "canonical order" spec §3 requires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Builds an OID, rejecting lengths outside `2..=128` per spec §3.
    pub fn new(subids: Vec<u32>) -> Result<Self, PriotError> {
        if subids.len() < MIN_OID_LEN {
            return Err(PriotError::InvalidValue("oid shorter than 2 sub-ids"));
        }
        if subids.len() > MAX_OID_LEN {
            return Err(PriotError::InvalidValue("oid longer than 128 sub-ids"));
        }
        Ok(Self(subids))
    }

    /// Builds an OID without validating length; for literal construction
    /// of well-known well-formed OIDs inside this crate.
    pub fn from_slice_unchecked(subids: &[u32]) -> Self {
        Self(subids.to_vec())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` is a prefix of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &Oid) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Length of the longest common prefix between two OIDs.
    pub fn common_prefix_len(&self, other: &Oid) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Appends one more sub-identifier, returning the new OID (used to
    /// build an instance OID from a registration prefix + remainder).
    pub fn child(&self, subid: u32) -> Oid {
        let mut v = self.0.clone();
        v.push(subid);
        Oid(v)
    }

    /// Appends a remainder of sub-identifiers.
    pub fn extended(&self, remainder: &[u32]) -> Oid {
        let mut v = self.0.clone();
        v.extend_from_slice(remainder);
        Oid(v)
    }

    /// The sub-identifiers of `self` beyond `prefix`, assuming `prefix` is
    /// a prefix of `self` (used by the registry to compute a handler's
    /// "instance" index, spec §4.4 `lookup`'s `remainder`).
    pub fn strip_prefix(&self, prefix: &Oid) -> Option<&[u32]> {
        if prefix.is_prefix_of(self) {
            Some(&self.0[prefix.0.len()..])
        } else {
            None
        }
    }

    /// The lexicographic successor of this OID within the space of valid
    /// OIDs: append a zero sub-identifier (the smallest OID strictly
    /// greater than `self` that has `self` as a proper prefix).
    pub fn successor_by_descent(&self) -> Oid {
        self.child(0)
    }

    /// The next OID at the same depth or shallower reached by
    /// incrementing the last sub-identifier and truncating any deeper
    /// component, used when a subtree is lexicographically exhausted.
    pub fn sibling_successor(&self) -> Option<Oid> {
        let mut v = self.0.clone();
        loop {
            match v.last_mut() {
                None => return None,
                Some(last) => {
                    if let Some(next) = last.checked_add(1) {
                        *last = next;
                        return Some(Oid(v));
                    }
                    v.pop();
                    if v.len() < MIN_OID_LEN {
                        return None;
                    }
                },
            }
        }
    }
}

impl TryFrom<Vec<u32>> for Oid {
    type Error = PriotError;

    fn try_from(v: Vec<u32>) -> Result<Self, Self::Error> {
        Oid::new(v)
    }
}

impl From<Oid> for Vec<u32> {
    fn from(o: Oid) -> Self {
        o.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            write!(f, "{first}")?;
        }
        for sub in iter {
            write!(f, ".{sub}")?;
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! oid {
    ($($n:expr),+ $(,)?) => {
        $crate::data::oid::Oid::from_slice_unchecked(&[$($n),+])
    };
}
