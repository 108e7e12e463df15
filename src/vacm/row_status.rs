// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The RowStatus textual convention (RFC 2579 §2), specified once here and
//! shared by the USM user table and every VACM table (spec §4.5/§9: "it
//! is specified once ... and reused; the source open-codes it in each
//! table").

use crate::error::PriotError;

/// RFC 2579 `RowStatus` states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Active,
    NotInService,
    NotReady,
    CreateAndGo,
    CreateAndWait,
    Destroy,
}

impl RowStatus {
    /// A row in this state participates in authorization/lookup decisions.
    /// `NotReady` and `NotInService` rows are visible to readers but
    /// skipped, per spec §4.5/§5.
    pub fn is_usable(self) -> bool {
        matches!(self, RowStatus::Active)
    }

    /// Validates a requested transition out of `self` into `next`,
    /// enforcing the object-level invariant spec §4.5 calls out: a row
    /// cannot become `active` until its prerequisites (view references,
    /// for VACM access rows) are satisfied — checked by the caller via
    /// `prerequisites_met`, not by this function, since the invariant is
    /// table-specific. `storage_type` gates the whole transition first
    /// (RFC 2579 §2: a `permanent`/`readOnly` row rejects any SET-driven
    /// row-status change, `not-writable` on the wire).
    pub fn transition(self, next: RowStatus, storage_type: StorageType, prerequisites_met: bool) -> Result<RowStatus, PriotError> {
        use RowStatus::*;
        if !storage_type.is_mutable() {
            return Err(PriotError::NotWritable);
        }
        let ok = match (self, next) {
            // CreateAndGo / CreateAndWait only make sense as the initial
            // state, handled by the table's `create_row`, not here.
            (_, CreateAndGo) | (_, CreateAndWait) => false,
            (_, Destroy) => true,
            (NotReady, Active) => prerequisites_met,
            (NotInService, Active) => prerequisites_met,
            (Active, Active) => true,
            (Active, NotInService) => true,
            (NotInService, NotInService) => true,
            (NotReady, NotInService) => true,
            _ => false,
        };
        if ok {
            Ok(next)
        } else {
            Err(PriotError::InconsistentValue)
        }
    }

    /// RFC 2579's wire-visible numeric code for this state.
    pub fn to_i32(self) -> i32 {
        match self {
            RowStatus::Active => 1,
            RowStatus::NotInService => 2,
            RowStatus::NotReady => 3,
            RowStatus::CreateAndGo => 4,
            RowStatus::CreateAndWait => 5,
            RowStatus::Destroy => 6,
        }
    }

    /// Decodes an incoming SET's `Integer32` value as a `RowStatus`,
    /// rejecting anything outside RFC 2579's six codes with `wrongValue`.
    pub fn from_i32(code: i32) -> Result<RowStatus, PriotError> {
        match code {
            1 => Ok(RowStatus::Active),
            2 => Ok(RowStatus::NotInService),
            3 => Ok(RowStatus::NotReady),
            4 => Ok(RowStatus::CreateAndGo),
            5 => Ok(RowStatus::CreateAndWait),
            6 => Ok(RowStatus::Destroy),
            _ => Err(PriotError::WrongValue),
        }
    }

    /// The initial state for a freshly created row, given whether all
    /// mandatory columns were supplied in the same SET request
    /// (`CreateAndGo`) or are expected to follow (`CreateAndWait`).
    pub fn initial(create_and_go: bool, prerequisites_met: bool) -> RowStatus {
        if create_and_go {
            if prerequisites_met { RowStatus::Active } else { RowStatus::NotReady }
        } else if prerequisites_met {
            RowStatus::NotInService
        } else {
            RowStatus::NotReady
        }
    }
}

/// RFC 2579 `StorageType`: shared by USM and VACM rows alongside
/// `RowStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Other,
    Volatile,
    NonVolatile,
    Permanent,
    ReadOnly,
}

impl StorageType {
    /// `Permanent`/`ReadOnly` rows reject SET-driven row-status changes.
    pub fn is_mutable(self) -> bool {
        matches!(self, StorageType::Other | StorageType::Volatile | StorageType::NonVolatile)
    }

    /// Rows worth writing to the persistent state file (spec §6): every
    /// kind except purely in-memory `Volatile`.
    pub fn is_persistent(self) -> bool {
        !matches!(self, StorageType::Volatile)
    }
}
