// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Security-to-group mapping and the access table (spec §4.5, RFC 3415
//! §5.2/§5.4): which group a principal belongs to, and which view that
//! group may use for a given context/model/level combination.

use dashmap::DashMap;

use crate::{
    data::pdu::{SecurityLevel, SecurityModel},
    error::PriotError,
    vacm::row_status::{RowStatus, StorageType},
};

/// `vacmSecurityToGroupTable` row.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub group_name: String,
    pub storage_type: StorageType,
    pub row_status: RowStatus,
}

/// `(security_model, security_name) -> group`.
#[derive(Debug, Default)]
pub struct GroupTable {
    entries: DashMap<(SecurityModel, String), GroupEntry>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, model: SecurityModel, security_name: &str, entry: GroupEntry) {
        self.entries.insert((model, security_name.to_string()), entry);
    }

    pub fn remove(&self, model: SecurityModel, security_name: &str) {
        self.entries.remove(&(model, security_name.to_string()));
    }

    pub fn group_for(&self, model: SecurityModel, security_name: &str) -> Option<String> {
        self.entries
            .get(&(model, security_name.to_string()))
            .filter(|e| e.row_status.is_usable())
            .map(|e| e.group_name.clone())
    }

    /// Drives a `vacmSecurityToGroupTable` row through a SET-requested
    /// `RowStatus` transition (spec §4.5, RFC 2579 §2), creating it via
    /// `make_default` when absent and `next` is `CreateAndGo`/
    /// `CreateAndWait`. Returns the row's previous status, or `None` if
    /// the row did not exist before this call, so a SET-undo handler can
    /// restore exactly what was there.
    pub fn set_row_status(
        &self,
        model: SecurityModel,
        security_name: &str,
        next: RowStatus,
        prerequisites_met: bool,
        make_default: impl FnOnce() -> GroupEntry,
    ) -> Result<Option<RowStatus>, PriotError> {
        let key = (model, security_name.to_string());
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

    /// `(security_model, security_name, row)` for every persistent row.
    pub fn snapshot_non_volatile(&self) -> Vec<(SecurityModel, String, GroupEntry)> {
        self.entries
            .iter()
            .filter(|e| e.value().storage_type.is_persistent())
            .map(|e| {
                let (model, name) = e.key().clone();
                (model, name, e.value().clone())
            })
            .collect()
    }
}

/// Whether `vacmAccessContextMatch` requires exact equality or accepts
/// `context_name` as a prefix of the request's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMatch {
    Exact,
    Prefix,
}

/// `vacmAccessTable` row, keyed by `(group, context_prefix, model,
/// level)`.
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub group_name: String,
    pub context_prefix: String,
    pub security_model: Option<SecurityModel>,
    pub security_level: SecurityLevel,
    pub context_match: ContextMatch,
    pub read_view: String,
    pub write_view: String,
    pub notify_view: String,
    pub storage_type: StorageType,
    pub row_status: RowStatus,
}

impl AccessEntry {
    fn model_matches(&self, model: SecurityModel) -> bool {
        self.security_model.is_none_or(|m| m == model)
    }

    fn context_matches(&self, context_name: &str) -> bool {
        match self.context_match {
            ContextMatch::Exact => self.context_prefix == context_name,
            ContextMatch::Prefix => context_name.starts_with(&self.context_prefix),
        }
    }
}

/// Requested operation; selects which of `read_view`/`write_view`/
/// `notify_view` a resolved access entry hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Read,
    Write,
    Notify,
}

/// `vacmAccessTable`: resolves `(group, context, model, level, kind)` to a
/// view name, per spec §4.5 step 2's "closest match" rule — an exact
/// context match beats a prefix match; among prefix matches the longest
/// `contextPrefix` wins; within equal prefixes the candidate whose
/// `securityModel` is specific (not wildcarded) wins; a remaining tie
/// favors the lowest sufficient `securityLevel` (the row's level must
/// still be `<=` the request's level to match at all).
#[derive(Debug, Default)]
pub struct AccessTable {
    entries: DashMap<(String, String, Option<SecurityModel>, SecurityLevel), AccessEntry>,
}

impl AccessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: AccessEntry) {
        self.entries.insert(
            (
                entry.group_name.clone(),
                entry.context_prefix.clone(),
                entry.security_model,
                entry.security_level,
            ),
            entry,
        );
    }

    pub fn remove(
        &self,
        group_name: &str,
        context_prefix: &str,
        security_model: Option<SecurityModel>,
        security_level: SecurityLevel,
    ) {
        self.entries.remove(&(
            group_name.to_string(),
            context_prefix.to_string(),
            security_model,
            security_level,
        ));
    }

    /// Finds the closest-matching row for `group_name`/`context_name`
    /// under `model`/`level`, and returns the view name for `kind`. A
    /// resolved-but-empty view name means "no access" (RFC 3415 §5.4's
    /// zero-length-viewName convention); no matching row means the same.
    pub fn resolve(
        &self,
        group_name: &str,
        context_name: &str,
        model: SecurityModel,
        level: SecurityLevel,
        kind: ViewKind,
    ) -> Option<String> {
        let mut best: Option<&AccessEntry> = None;
        for item in self.entries.iter() {
            let row = item.value();
            if row.group_name != group_name
                || !row.row_status.is_usable()
                || !row.model_matches(model)
                || !row.context_matches(context_name)
                || row.security_level > level
            {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let r_exact = matches!(row.context_match, ContextMatch::Exact);
                    let b_exact = matches!(b.context_match, ContextMatch::Exact);
                    if r_exact != b_exact {
                        r_exact
                    } else if row.context_prefix.len() != b.context_prefix.len() {
                        row.context_prefix.len() > b.context_prefix.len()
                    } else {
                        let b_specific = b.security_model.is_some();
                        let r_specific = row.security_model.is_some();
                        if r_specific != b_specific {
                            r_specific
                        } else {
                            row.security_level < b.security_level
                        }
                    }
                },
            };
            if better {
                best = Some(row);
            }
        }
        best.map(|row| {
            match kind {
                ViewKind::Read => &row.read_view,
                ViewKind::Write => &row.write_view,
                ViewKind::Notify => &row.notify_view,
            }
            .clone()
        })
    }

    /// Drives a `vacmAccessTable` row through a SET-requested
    /// `RowStatus` transition, creating it via `make_default` when
    /// absent and `next` is `CreateAndGo`/`CreateAndWait` (spec §4.5).
    /// Returns the row's previous status, or `None` if it was just
    /// created.
    pub fn set_row_status(
        &self,
        key: (String, String, Option<SecurityModel>, SecurityLevel),
        next: RowStatus,
        prerequisites_met: bool,
        make_default: impl FnOnce() -> AccessEntry,
    ) -> Result<Option<RowStatus>, PriotError> {
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

    /// The raw `row_status` of `key`'s row, regardless of usability —
    /// unlike `resolve`, a `notReady`/`notInService` row is still
    /// visible here, since the row-status column itself must read back
    /// during the SET that is bringing it up (RFC 2579 §2).
    pub fn row_status_of(&self, key: &(String, String, Option<SecurityModel>, SecurityLevel)) -> Option<RowStatus> {
        self.entries.get(key).map(|e| e.row_status)
    }

    /// Overwrites `row_status` without going through `RowStatus::transition`'s
    /// rules; used only to reverse an already-applied SET (spec §4.6
    /// undo), where the five-phase protocol guarantees the target state
    /// was valid when it was first applied.
    pub fn force_row_status(&self, key: &(String, String, Option<SecurityModel>, SecurityLevel), status: RowStatus) {
        if let Some(mut row) = self.entries.get_mut(key) {
            row.row_status = status;
        }
    }

    /// Every persistent row, for state-file serialization.
    pub fn snapshot_non_volatile(&self) -> Vec<AccessEntry> {
        self.entries
            .iter()
            .filter(|e| e.value().storage_type.is_persistent())
            .map(|e| e.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        group: &str,
        ctx: &str,
        model: Option<SecurityModel>,
        level: SecurityLevel,
        read_view: &str,
    ) -> AccessEntry {
        AccessEntry {
            group_name: group.into(),
            context_prefix: ctx.into(),
            security_model: model,
            security_level: level,
            context_match: ContextMatch::Exact,
            read_view: read_view.into(),
            write_view: String::new(),
            notify_view: String::new(),
            storage_type: StorageType::NonVolatile,
            row_status: RowStatus::Active,
        }
    }

    #[test]
    fn specific_model_beats_wildcard() {
        let table = AccessTable::new();
        table.insert(row("grp", "", None, SecurityLevel::NoAuthNoPriv, "any-view"));
        table.insert(row("grp", "", Some(SecurityModel::Usm), SecurityLevel::NoAuthNoPriv, "usm-view"));

        let view = table
            .resolve("grp", "", SecurityModel::Usm, SecurityLevel::AuthPriv, ViewKind::Read)
            .expect("matches");
        assert_eq!(view, "usm-view");
    }

    #[test]
    fn requested_level_below_row_level_is_rejected() {
        let table = AccessTable::new();
        table.insert(row("grp", "", None, SecurityLevel::AuthPriv, "secure-view"));
        assert!(table
            .resolve("grp", "", SecurityModel::Usm, SecurityLevel::NoAuthNoPriv, ViewKind::Read)
            .is_none());
    }

    #[test]
    fn longest_context_prefix_wins() {
        let table = AccessTable::new();
        let mut general = row("grp", "", None, SecurityLevel::NoAuthNoPriv, "general-view");
        general.context_match = ContextMatch::Prefix;
        let mut specific = row("grp", "eng", None, SecurityLevel::NoAuthNoPriv, "eng-view");
        specific.context_match = ContextMatch::Prefix;
        table.insert(general);
        table.insert(specific);

        let view = table
            .resolve("grp", "engineering", SecurityModel::Community, SecurityLevel::NoAuthNoPriv, ViewKind::Read)
            .expect("matches");
        assert_eq!(view, "eng-view");
    }

    #[test]
    fn longer_context_prefix_outranks_specific_model() {
        let table = AccessTable::new();
        let mut model_specific = row("grp", "e", Some(SecurityModel::Usm), SecurityLevel::NoAuthNoPriv, "a-view");
        model_specific.context_match = ContextMatch::Prefix;
        let mut longer_prefix = row("grp", "eng", None, SecurityLevel::NoAuthNoPriv, "b-view");
        longer_prefix.context_match = ContextMatch::Prefix;
        table.insert(model_specific);
        table.insert(longer_prefix);

        let view = table
            .resolve("grp", "eng", SecurityModel::Usm, SecurityLevel::NoAuthNoPriv, ViewKind::Read)
            .expect("matches");
        assert_eq!(view, "b-view");
    }

    #[test]
    fn exact_context_match_beats_longer_prefix_match() {
        let table = AccessTable::new();
        let mut exact = row("grp", "eng", None, SecurityLevel::NoAuthNoPriv, "exact-view");
        exact.context_match = ContextMatch::Exact;
        let mut prefix = row("grp", "en", None, SecurityLevel::NoAuthNoPriv, "prefix-view");
        prefix.context_match = ContextMatch::Prefix;
        table.insert(exact);
        table.insert(prefix);

        let view = table
            .resolve("grp", "eng", SecurityModel::Community, SecurityLevel::NoAuthNoPriv, ViewKind::Read)
            .expect("matches");
        assert_eq!(view, "exact-view");
    }

    #[test]
    fn set_row_status_creates_and_destroys_a_group_row() {
        let table = GroupTable::new();
        let made = table
            .set_row_status(SecurityModel::Usm, "alice", RowStatus::CreateAndGo, true, || GroupEntry {
                group_name: "g".into(),
                storage_type: StorageType::NonVolatile,
                row_status: RowStatus::NotReady,
            })
            .expect("creates");
        assert_eq!(made, None);
        assert_eq!(table.group_for(SecurityModel::Usm, "alice"), Some("g".into()));

        let previous = table
            .set_row_status(SecurityModel::Usm, "alice", RowStatus::Destroy, true, || unreachable!())
            .expect("destroys");
        assert_eq!(previous, Some(RowStatus::Active));
        assert_eq!(table.group_for(SecurityModel::Usm, "alice"), None);
    }

    #[test]
    fn set_row_status_on_read_only_storage_is_rejected() {
        let table = GroupTable::new();
        table.insert(
            SecurityModel::Usm,
            "bob",
            GroupEntry { group_name: "g".into(), storage_type: StorageType::Permanent, row_status: RowStatus::Active },
        );
        let err = table
            .set_row_status(SecurityModel::Usm, "bob", RowStatus::Destroy, true, || unreachable!())
            .unwrap_err();
        assert_eq!(err, crate::error::PriotError::NotWritable);
    }

    #[test]
    fn set_row_status_without_create_and_an_absent_row_is_inconsistent_name() {
        let table = AccessTable::new();
        let err = table
            .set_row_status(
                ("grp".into(), "".into(), None, SecurityLevel::NoAuthNoPriv),
                RowStatus::Active,
                true,
                || unreachable!(),
            )
            .unwrap_err();
        assert_eq!(err, crate::error::PriotError::InconsistentName);
    }

    #[test]
    fn lowest_sufficient_level_wins_on_a_full_tie() {
        let table = AccessTable::new();
        table.insert(row("grp", "", None, SecurityLevel::NoAuthNoPriv, "low-view"));
        table.insert(row("grp", "", None, SecurityLevel::AuthNoPriv, "mid-view"));

        let view = table
            .resolve("grp", "", SecurityModel::Usm, SecurityLevel::AuthPriv, ViewKind::Read)
            .expect("matches");
        assert_eq!(view, "low-view");
    }
}
