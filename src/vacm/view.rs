// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! View-tree-family masks (spec §4.5, RFC 3415 §5.3): a named view is a
//! set of `(subtree, mask, included/excluded)` rows; membership of an OID
//! is decided by the most specific matching row.

use dashmap::DashMap;

use crate::{
    data::oid::Oid,
    error::PriotError,
    vacm::row_status::{RowStatus, StorageType},
};

/// One `vacmViewTreeFamilyTable` row.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    pub subtree: Oid,
    /// `None` means "all bits significant" (an exact subtree prefix
    /// match); `Some(mask)` follows RFC 3415's per-sub-identifier bitmask,
    /// most-significant-bit first, one bit per sub-identifier of
    /// `subtree`: a `0` bit makes that position a wildcard.
    pub mask: Option<Vec<u8>>,
    pub included: bool,
    pub storage_type: StorageType,
    pub row_status: RowStatus,
}

impl ViewEntry {
    /// Spec §4.5 mask semantics: MSB-first, one bit per sub-id of
    /// `subtree`, a `1` meaning "must match"; a bit past the end of the
    /// supplied mask bytes is "missing" and is treated as `1` (spec §4.5:
    /// "Missing trailing bits are treated as 1").
    fn bit_set(mask: &[u8], index: usize) -> bool {
        let byte = index / 8;
        let bit = 7 - (index % 8);
        match mask.get(byte) {
            Some(b) => b & (1 << bit) != 0,
            None => true,
        }
    }

    /// Whether `oid` falls within this family: every masked-significant
    /// sub-identifier of `subtree` must equal the corresponding one in
    /// `oid`; unmasked positions (and anything past `subtree`'s length)
    /// match unconditionally.
    fn covers(&self, oid: &Oid) -> bool {
        let subtree = self.subtree.as_slice();
        let candidate = oid.as_slice();
        if candidate.len() < subtree.len() {
            return false;
        }
        for (i, &want) in subtree.iter().enumerate() {
            let significant = match &self.mask {
                None => true,
                Some(mask) => Self::bit_set(mask, i),
            };
            if significant && candidate[i] != want {
                return false;
            }
        }
        true
    }

    /// Count of significant (`1`) mask bits over `subtree`'s sub-ids,
    /// used as the tie-break in spec §4.5 step 4 ("the entry with the
    /// most 1-bits in the mask"). No mask is "all bits significant".
    fn mask_popcount(&self) -> u32 {
        let len = self.subtree.len();
        match &self.mask {
            None => len as u32,
            Some(mask) => (0..len).filter(|&i| Self::bit_set(mask, i)).count() as u32,
        }
    }
}

/// `vacmViewTreeFamilyTable` grouped by view name; rows are addressed by
/// `(view_name, subtree, mask)` per spec §3's relation
/// `(view-name, subtree-oid, mask) → {included, excluded}` — two rows
/// sharing a subtree but differing in mask are distinct entries, not one
/// clobbering the other.
#[derive(Debug, Default)]
pub struct ViewTree {
    entries: DashMap<(String, Vec<u32>, Option<Vec<u8>>), ViewEntry>,
}

/// The family row that decided a membership test, so callers (and tests)
/// can tell an explicit exclusion from "no family matched at all".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFamily {
    Included,
    Excluded,
    NoMatch,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, view_name: &str, entry: ViewEntry) {
        self.entries.insert((view_name.to_string(), entry.subtree.as_slice().to_vec(), entry.mask.clone()), entry);
    }

    pub fn remove(&self, view_name: &str, subtree: &Oid, mask: Option<&[u8]>) {
        self.entries.remove(&(view_name.to_string(), subtree.as_slice().to_vec(), mask.map(<[u8]>::to_vec)));
    }

    /// Spec §4.5 step 4's matching rule: among every usable family row
    /// covering `oid`, the one whose `subtree` is longest (most specific)
    /// wins; ties broken by the entry with the most `1`-bits in its mask.
    pub fn classify(&self, view_name: &str, oid: &Oid) -> ViewFamily {
        let mut best: Option<&ViewEntry> = None;
        for entry in self.entries.iter() {
            let ((name, _, _), row) = entry.pair();
            if name != view_name || !row.row_status.is_usable() || !row.covers(oid) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let b_len = b.subtree.len();
                    let r_len = row.subtree.len();
                    if r_len != b_len {
                        r_len > b_len
                    } else {
                        row.mask_popcount() > b.mask_popcount()
                    }
                },
            };
            if better {
                best = Some(row);
            }
        }
        match best {
            Some(row) if row.included => ViewFamily::Included,
            Some(_) => ViewFamily::Excluded,
            None => ViewFamily::NoMatch,
        }
    }

    /// True only for an explicit, unexcluded match; an empty/unnamed view
    /// (empty `view_name`) never grants access, mirroring
    /// `vacmAccessTable`'s "no view configured" convention.
    pub fn is_permitted(&self, view_name: &str, oid: &Oid) -> bool {
        if view_name.is_empty() {
            return false;
        }
        matches!(self.classify(view_name, oid), ViewFamily::Included)
    }

    /// True if any row (usable or not) is registered under `view_name` —
    /// used to validate a prerequisite view reference before a VACM
    /// access row is allowed to become `active` (spec §4.5).
    pub fn view_exists(&self, view_name: &str) -> bool {
        if view_name.is_empty() {
            return true;
        }
        self.entries.iter().any(|e| e.key().0 == view_name)
    }

    /// Drives a `vacmViewTreeFamilyTable` row through a SET-requested
    /// `RowStatus` transition, creating it via `make_default` when
    /// absent and `next` is `CreateAndGo`/`CreateAndWait` (spec §4.5).
    /// Returns the row's previous status, or `None` if it was just
    /// created.
    pub fn set_row_status(
        &self,
        view_name: &str,
        subtree: &Oid,
        mask: Option<&[u8]>,
        next: RowStatus,
        prerequisites_met: bool,
        make_default: impl FnOnce() -> ViewEntry,
    ) -> Result<Option<RowStatus>, PriotError> {
        let key = (view_name.to_string(), subtree.as_slice().to_vec(), mask.map(<[u8]>::to_vec));
        if let Some(mut row) = self.entries.get_mut(&key) {
            let previous = row.row_status;
            row.row_status = row.row_status.transition(next, row.storage_type, prerequisites_met)?;
            return Ok(Some(previous));
        }
        match next {
            RowStatus::CreateAndGo | RowStatus::CreateAndWait => {
                let mut entry = make_default();
                entry.row_status = RowStatus::initial(next == RowStatus::CreateAndGo, prerequisites_met);
                self.entries.insert(key, entry);
                Ok(None)
            },
            _ => Err(PriotError::InconsistentName),
        }
    }

    /// `(view_name, row)` for every persistent row.
    pub fn snapshot_non_volatile(&self) -> Vec<(String, ViewEntry)> {
        self.entries
            .iter()
            .filter(|e| e.value().storage_type.is_persistent())
            .map(|e| (e.key().0.clone(), e.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn entry(subtree: Oid, included: bool) -> ViewEntry {
        ViewEntry {
            subtree,
            mask: None,
            included,
            storage_type: StorageType::NonVolatile,
            row_status: RowStatus::Active,
        }
    }

    #[test]
    fn longest_prefix_wins_over_shorter_inclusion() {
        let tree = ViewTree::new();
        tree.insert("all", entry(oid!(1, 3, 6, 1, 2, 1), true));
        tree.insert("all", entry(oid!(1, 3, 6, 1, 2, 1, 1, 4), false));

        assert!(tree.is_permitted("all", &oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)));
        assert!(!tree.is_permitted("all", &oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)));
    }

    #[test]
    fn unmatched_oid_is_not_permitted() {
        let tree = ViewTree::new();
        tree.insert("all", entry(oid!(1, 3, 6, 1, 2, 1), true));
        assert!(!tree.is_permitted("all", &oid!(1, 3, 6, 1, 4, 1)));
    }

    #[test]
    fn mask_wildcards_a_sub_identifier() {
        // subtree is 8 sub-ids long; mask bits 0..6 significant, bit 7
        // (the last subtree position) wildcarded.
        let subtree = oid!(1, 3, 6, 1, 2, 1, 2, 2);
        let mut row = entry(subtree, true);
        row.mask = Some(vec![0b1111_1110]);
        let tree = ViewTree::new();
        tree.insert("v", row);
        assert!(tree.is_permitted("v", &oid!(1, 3, 6, 1, 2, 1, 2, 99, 1, 10)));
        assert!(!tree.is_permitted("v", &oid!(1, 3, 6, 1, 2, 1, 9, 2)));
    }

    #[test]
    fn empty_view_name_never_grants() {
        let tree = ViewTree::new();
        assert!(!tree.is_permitted("", &oid!(1, 3, 6, 1)));
    }

    #[test]
    fn missing_trailing_mask_bits_are_significant() {
        // Mask supplies only one byte (8 bits) for a 9-sub-id subtree;
        // the 9th bit is missing and must be treated as significant.
        let subtree = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1);
        let mut row = entry(subtree, true);
        row.mask = Some(vec![0b1111_1111]);
        let tree = ViewTree::new();
        tree.insert("v", row);
        assert!(tree.is_permitted("v", &oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 5)));
        assert!(!tree.is_permitted("v", &oid!(1, 3, 6, 1, 2, 1, 2, 2, 9, 5)));
    }

    #[test]
    fn view_exists_reports_any_registered_row_including_unusable_ones() {
        let tree = ViewTree::new();
        assert!(!tree.view_exists("all"));
        assert!(tree.view_exists(""));
        tree.insert("all", entry(oid!(1, 3, 6), true));
        assert!(tree.view_exists("all"));
    }

    #[test]
    fn set_row_status_creates_then_destroys_a_view_row() {
        let tree = ViewTree::new();
        let subtree = oid!(1, 3, 6);
        let made = tree
            .set_row_status("all", &subtree, None, RowStatus::CreateAndGo, true, || entry(subtree.clone(), true))
            .expect("creates");
        assert_eq!(made, None);
        assert!(tree.is_permitted("all", &oid!(1, 3, 6, 1)));

        let previous = tree
            .set_row_status("all", &subtree, None, RowStatus::Destroy, true, || unreachable!())
            .expect("destroys");
        assert_eq!(previous, Some(RowStatus::Active));
        assert!(!tree.is_permitted("all", &oid!(1, 3, 6, 1)));
    }

    #[test]
    fn same_subtree_different_mask_coexist_instead_of_clobbering() {
        let subtree = oid!(1, 3, 6, 1, 2, 1, 2, 2);
        let mut wide_open = entry(subtree.clone(), true);
        wide_open.mask = Some(vec![0b1111_1110]); // last sub-id wildcarded
        let mut narrow = entry(subtree, false);
        narrow.mask = None; // exact-subtree exclusion, most specific

        let tree = ViewTree::new();
        tree.insert("v", wide_open);
        tree.insert("v", narrow);

        // Both rows cover the same subtree length; the all-significant
        // (no mask) row has the higher popcount and wins the tie.
        assert!(!tree.is_permitted("v", &oid!(1, 3, 6, 1, 2, 1, 2, 2, 0)));
        // An OID whose wildcarded position (index 7) diverges from the
        // subtree is covered only by the wildcarding row — proving both
        // rows survived the insert instead of one clobbering the other.
        assert!(tree.is_permitted("v", &oid!(1, 3, 6, 1, 2, 1, 2, 9, 1, 5)));
    }
}
