// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Single textual state file per engine (spec §6): `snmpEngineID`,
//! `snmpEngineBoots`, non-volatile USM users, and non-volatile VACM
//! rows, stored one record per line as `key value…` with shell-style
//! quoting. Unknown keys are round-tripped verbatim so a hand-edited or
//! newer-version file never loses data it doesn't understand.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::Path,
};

use anyhow::{Context, Result};

use crate::{
    data::{oid::Oid, pdu::SecurityModel},
    security::usm::{UsmUser, UsmUserTable},
    vacm::{
        access::{AccessEntry, AccessTable, ContextMatch, GroupEntry, GroupTable},
        row_status::{RowStatus, StorageType},
        view::{ViewEntry, ViewTree},
    },
};

/// One parsed line: the leading token is the key, the rest are
/// shell-quoted fields.
#[derive(Debug, Clone)]
struct Record {
    key: String,
    fields: Vec<String>,
}

/// The engine state file, held as an ordered list of records so unknown
/// keys written by a different engine version survive a load-then-save
/// round trip untouched.
#[derive(Debug, Default)]
pub struct StateFile {
    records: Vec<Record>,
}

const KEY_ENGINE_BOOTS: &str = "engineBoots";
const KEY_USM_USER: &str = "usmUser";
const KEY_VACM_GROUP: &str = "vacmGroup";
const KEY_VACM_ACCESS: &str = "vacmAccess";
const KEY_VACM_VIEW: &str = "vacmView";

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the state file if present; a missing file is a fresh
    /// engine, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let Ok(text) = fs::read_to_string(path) else {
            return Ok(Self::new());
        };
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = shell_words::split(line)
                .with_context(|| format!("{}:{lineno}: unterminated quote", path.display()))?;
            if fields.is_empty() {
                continue;
            }
            let key = fields.remove(0);
            records.push(Record { key, fields });
        }
        Ok(Self { records })
    }

    /// Writes the state file atomically-ish: build the full text, then
    /// replace the file in one `write`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.key);
            for field in &record.fields {
                out.push(' ');
                out.push_str(&shell_words::quote(field));
            }
            out.push('\n');
        }
        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        file.write_all(out.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    fn get_single(&self, key: &str) -> Option<&str> {
        self.records.iter().find(|r| r.key == key).and_then(|r| r.fields.first()).map(String::as_str)
    }

    fn set_single(&mut self, key: &str, value: String) {
        if let Some(record) = self.records.iter_mut().find(|r| r.key == key) {
            record.fields = vec![value];
        } else {
            self.records.push(Record { key: key.to_string(), fields: vec![value] });
        }
    }

    fn replace_all(&mut self, key: &str, rows: Vec<Vec<String>>) {
        self.records.retain(|r| r.key != key);
        for fields in rows {
            self.records.push(Record { key: key.to_string(), fields });
        }
    }

    fn all(&self, key: &str) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |r| r.key == key)
    }

    /// `snmpEngineBoots`, defaulting to `0` for a fresh state file.
    pub fn engine_boots(&self) -> u32 {
        self.get_single(KEY_ENGINE_BOOTS).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    pub fn set_engine_boots(&mut self, boots: u32) {
        self.set_single(KEY_ENGINE_BOOTS, boots.to_string());
    }

    /// Replaces every `usmUser` record with the current non-volatile
    /// contents of `table`.
    pub fn save_usm_users(&mut self, table: &UsmUserTable) {
        let rows = table
            .snapshot_non_volatile()
            .into_iter()
            .map(|u| {
                vec![
                    hex::encode(&u.engine_id),
                    u.user_name,
                    u.auth_protocol.map(|p| format!("{p:?}")).unwrap_or_else(|| "none".into()),
                    hex::encode(&u.auth_key),
                    u.priv_protocol.map(|p| format!("{p:?}")).unwrap_or_else(|| "none".into()),
                    hex::encode(&u.priv_key),
                ]
            })
            .collect();
        self.replace_all(KEY_USM_USER, rows);
    }

    /// Parses stored `usmUser` records back into full rows, ready for
    /// `UsmUserTable::insert`. Rows are always restored `Active` with
    /// `NonVolatile` storage, since that's the only combination a state
    /// file can persist.
    pub fn load_usm_users(&self) -> Result<Vec<UsmUser>> {
        let mut out = Vec::new();
        for record in self.all(KEY_USM_USER) {
            let f = &record.fields;
            anyhow::ensure!(f.len() == 6, "malformed usmUser record");
            out.push(UsmUser {
                engine_id: hex::decode(&f[0]).context("usmUser engine id")?,
                user_name: f[1].clone(),
                auth_protocol: parse_auth_protocol(&f[2])?,
                auth_key: hex::decode(&f[3]).context("usmUser auth key")?,
                priv_protocol: parse_priv_protocol(&f[4])?,
                priv_key: hex::decode(&f[5]).context("usmUser priv key")?,
                clone_from: None,
                storage_type: StorageType::NonVolatile,
                row_status: RowStatus::Active,
            });
        }
        Ok(out)
    }

    pub fn save_vacm_groups(&mut self, table: &GroupTable) {
        let rows = table
            .snapshot_non_volatile()
            .into_iter()
            .map(|(model, name, entry)| {
                vec![security_model_tag(model).to_string(), name, entry.group_name]
            })
            .collect();
        self.replace_all(KEY_VACM_GROUP, rows);
    }

    pub fn load_vacm_groups(&self) -> Result<Vec<(SecurityModel, String, GroupEntry)>> {
        let mut out = Vec::new();
        for record in self.all(KEY_VACM_GROUP) {
            let f = &record.fields;
            anyhow::ensure!(f.len() == 3, "malformed vacmGroup record");
            out.push((
                parse_security_model(&f[0])?,
                f[1].clone(),
                GroupEntry {
                    group_name: f[2].clone(),
                    storage_type: StorageType::NonVolatile,
                    row_status: RowStatus::Active,
                },
            ));
        }
        Ok(out)
    }

    pub fn save_vacm_access(&mut self, table: &AccessTable) {
        let rows = table
            .snapshot_non_volatile()
            .into_iter()
            .map(|e| {
                vec![
                    e.group_name,
                    e.context_prefix,
                    e.security_model.map(security_model_tag).unwrap_or("any").to_string(),
                    format!("{:?}", e.security_level),
                    if e.context_match == ContextMatch::Prefix { "prefix".to_string() } else { "exact".to_string() },
                    e.read_view,
                    e.write_view,
                    e.notify_view,
                ]
            })
            .collect();
        self.replace_all(KEY_VACM_ACCESS, rows);
    }

    pub fn load_vacm_access(&self) -> Result<Vec<AccessEntry>> {
        let mut out = Vec::new();
        for record in self.all(KEY_VACM_ACCESS) {
            let f = &record.fields;
            anyhow::ensure!(f.len() == 8, "malformed vacmAccess record");
            out.push(AccessEntry {
                group_name: f[0].clone(),
                context_prefix: f[1].clone(),
                security_model: if f[2] == "any" { None } else { Some(parse_security_model(&f[2])?) },
                security_level: parse_security_level(&f[3])?,
                context_match: if f[4] == "prefix" { ContextMatch::Prefix } else { ContextMatch::Exact },
                read_view: f[5].clone(),
                write_view: f[6].clone(),
                notify_view: f[7].clone(),
                storage_type: StorageType::NonVolatile,
                row_status: RowStatus::Active,
            });
        }
        Ok(out)
    }

    pub fn save_vacm_views(&mut self, tree: &ViewTree) {
        let rows = tree
            .snapshot_non_volatile()
            .into_iter()
            .map(|(name, entry)| {
                vec![
                    name,
                    entry.subtree.to_string(),
                    entry.mask.map(hex::encode).unwrap_or_default(),
                    entry.included.to_string(),
                ]
            })
            .collect();
        self.replace_all(KEY_VACM_VIEW, rows);
    }

    pub fn load_vacm_views(&self) -> Result<Vec<(String, ViewEntry)>> {
        let mut out = Vec::new();
        for record in self.all(KEY_VACM_VIEW) {
            let f = &record.fields;
            anyhow::ensure!(f.len() == 4, "malformed vacmView record");
            let subtree: Vec<u32> = f[1]
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<u32>())
                .collect::<std::result::Result<_, _>>()
                .context("vacmView subtree")?;
            let mask = if f[2].is_empty() { None } else { Some(hex::decode(&f[2]).context("vacmView mask")?) };
            out.push((
                f[0].clone(),
                ViewEntry {
                    subtree: Oid::new(subtree).context("vacmView subtree")?,
                    mask,
                    included: f[3].parse().context("vacmView included")?,
                    storage_type: StorageType::NonVolatile,
                    row_status: RowStatus::Active,
                },
            ));
        }
        Ok(out)
    }
}

fn security_model_tag(model: SecurityModel) -> &'static str {
    match model {
        SecurityModel::Community => "community",
        SecurityModel::Usm => "usm",
    }
}

fn parse_security_model(tag: &str) -> Result<SecurityModel> {
    match tag {
        "community" => Ok(SecurityModel::Community),
        "usm" => Ok(SecurityModel::Usm),
        other => anyhow::bail!("unknown security model tag {other:?}"),
    }
}

fn parse_security_level(tag: &str) -> Result<crate::data::pdu::SecurityLevel> {
    use crate::data::pdu::SecurityLevel::*;
    match tag {
        "NoAuthNoPriv" => Ok(NoAuthNoPriv),
        "AuthNoPriv" => Ok(AuthNoPriv),
        "AuthPriv" => Ok(AuthPriv),
        other => anyhow::bail!("unknown security level tag {other:?}"),
    }
}

fn parse_auth_protocol(tag: &str) -> Result<Option<crate::crypto::digest::AuthProtocol>> {
    use crate::crypto::digest::AuthProtocol::*;
    match tag {
        "none" => Ok(None),
        "HmacMd5" => Ok(Some(HmacMd5)),
        "HmacSha1" => Ok(Some(HmacSha1)),
        other => anyhow::bail!("unknown auth protocol tag {other:?}"),
    }
}

fn parse_priv_protocol(tag: &str) -> Result<Option<crate::crypto::kdf::PrivProtocol>> {
    use crate::crypto::kdf::PrivProtocol::*;
    match tag {
        "none" => Ok(None),
        "DesCbc" => Ok(Some(DesCbc)),
        "AesCfb128" => Ok(Some(AesCfb128)),
        other => anyhow::bail!("unknown priv protocol tag {other:?}"),
    }
}

/// Unknown keys this engine version doesn't recognize; kept only so
/// `save` after `load` doesn't silently drop them. Exposed for
/// diagnostics, never interpreted.
pub fn unknown_keys(file: &StateFile) -> BTreeMap<String, usize> {
    let known = [KEY_ENGINE_BOOTS, KEY_USM_USER, KEY_VACM_GROUP, KEY_VACM_ACCESS, KEY_VACM_VIEW];
    let mut counts = BTreeMap::new();
    for record in &file.records {
        if !known.contains(&record.key.as_str()) {
            *counts.entry(record.key.clone()).or_insert(0) += 1;
        }
    }
    counts
}
