// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Handler chain (spec §4.4, §4.6): what a subtree registration actually
//! invokes. Built-in instrumentation is a closed, compile-time-known set
//! — one object per MIB group this core ships — so dispatch is a plain
//! `match` under `enum_dispatch` rather than a vtable.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use dashmap::DashMap;
use enum_dispatch::enum_dispatch;

use crate::{
    data::{oid::Oid, pdu::{SecurityLevel, SecurityModel}, value::Value, Varbind},
    error::{EngineCounters, PriotError},
    vacm::{access::{AccessEntry, AccessTable, ContextMatch}, row_status::{RowStatus, StorageType}},
};

/// Which phase of the request pipeline is invoking a handler (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Get,
    GetNext,
    GetBulk,
    SetReserve1,
    SetReserve2,
    SetAction,
    SetCommit,
    SetFree,
    SetUndo,
}

impl RequestMode {
    pub fn is_set_phase(self) -> bool {
        matches!(
            self,
            RequestMode::SetReserve1
                | RequestMode::SetReserve2
                | RequestMode::SetAction
                | RequestMode::SetCommit
                | RequestMode::SetFree
                | RequestMode::SetUndo
        )
    }
}

/// What one handler invocation produced for its whole batch of requests.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Fully answered, one varbind per request, in request order.
    Done(Vec<Varbind>),
    /// Suspended; the caller parks the batch pending
    /// `complete_delegated` (spec §4.6 "DELEGATED").
    Delegated,
    /// Rejects the whole batch; `index` is 0-based into the request
    /// slice (callers translate to the wire's 1-based `error-index`).
    Error { status: PriotError, index: usize },
}

/// A handler answers a batch of requests for one `RequestMode`.
/// `txn_id` correlates the five SET phases belonging to one
/// transaction (spec §4.6); `Get`/`GetNext`/`GetBulk` handlers ignore it.
#[enum_dispatch]
pub trait Handler {
    fn invoke(&self, mode: RequestMode, txn_id: u64, requests: &[Varbind]) -> HandlerOutcome;
}

/// A single read-only scalar instance (e.g. `sysDescr.0`).
#[derive(Debug, Clone)]
pub struct ScalarHandler {
    pub instance: Oid,
    pub value: Arc<RwLock<Value>>,
}

impl ScalarHandler {
    pub fn new(instance: Oid, value: Value) -> Self {
        Self { instance, value: Arc::new(RwLock::new(value)) }
    }
}

impl Handler for ScalarHandler {
    fn invoke(&self, mode: RequestMode, _txn_id: u64, requests: &[Varbind]) -> HandlerOutcome {
        match mode {
            RequestMode::Get => {
                let current = self.value.read().expect("lock poisoned").clone();
                HandlerOutcome::Done(
                    requests
                        .iter()
                        .map(|r| {
                            if r.oid == self.instance {
                                Varbind::new(r.oid.clone(), current.clone())
                            } else {
                                Varbind::new(r.oid.clone(), Value::NoSuchInstance)
                            }
                        })
                        .collect(),
                )
            },
            RequestMode::GetNext | RequestMode::GetBulk => {
                let current = self.value.read().expect("lock poisoned").clone();
                HandlerOutcome::Done(
                    requests
                        .iter()
                        .map(|r| {
                            if r.oid < self.instance {
                                Varbind::new(self.instance.clone(), current.clone())
                            } else {
                                Varbind::new(r.oid.clone(), Value::EndOfMibView)
                            }
                        })
                        .collect(),
                )
            },
            _ => HandlerOutcome::Error { status: PriotError::NotWritable, index: 0 },
        }
    }
}

/// Read-only counters exposed as scalar instances under one base OID
/// (e.g. the `snmp`/`usmStats` groups), one `fn` accessor per
/// sub-identifier — grounded on `error::EngineCounters`'s field set.
#[derive(Clone)]
pub struct CounterGroupHandler {
    base: Oid,
    counters: Arc<EngineCounters>,
    fields: Arc<Vec<(u32, fn(&EngineCounters) -> u64)>>,
}

impl CounterGroupHandler {
    pub fn new(base: Oid, counters: Arc<EngineCounters>, fields: Vec<(u32, fn(&EngineCounters) -> u64)>) -> Self {
        Self { base, counters, fields: Arc::new(fields) }
    }

    fn instance_oid(&self, subid: u32) -> Oid {
        self.base.child(subid).child(0)
    }

    fn value_for(&self, subid: u32) -> Option<Value> {
        self.fields
            .iter()
            .find(|(s, _)| *s == subid)
            .map(|(_, accessor)| Value::Counter32(accessor(&self.counters) as u32))
    }
}

impl Handler for CounterGroupHandler {
    fn invoke(&self, mode: RequestMode, _txn_id: u64, requests: &[Varbind]) -> HandlerOutcome {
        match mode {
            RequestMode::Get => HandlerOutcome::Done(
                requests
                    .iter()
                    .map(|r| {
                        let value = r
                            .oid
                            .strip_prefix(&self.base)
                            .and_then(|rem| match rem {
                                [subid, 0] => self.value_for(*subid),
                                _ => None,
                            })
                            .unwrap_or(Value::NoSuchInstance);
                        Varbind::new(r.oid.clone(), value)
                    })
                    .collect(),
            ),
            RequestMode::GetNext | RequestMode::GetBulk => HandlerOutcome::Done(
                requests
                    .iter()
                    .map(|r| {
                        let mut instances: Vec<u32> = self.fields.iter().map(|(s, _)| *s).collect();
                        instances.sort_unstable();
                        let next_subid = instances.into_iter().find(|subid| self.instance_oid(*subid) > r.oid);
                        match next_subid.and_then(|s| self.value_for(s).map(|v| (s, v))) {
                            Some((subid, value)) => Varbind::new(self.instance_oid(subid), value),
                            None => Varbind::new(r.oid.clone(), Value::EndOfMibView),
                        }
                    })
                    .collect(),
            ),
            _ => HandlerOutcome::Error { status: PriotError::NotWritable, index: 0 },
        }
    }
}

/// A generic, sparsely-populated read-write table, keyed by full
/// instance OID, supporting the complete five-phase SET protocol via a
/// per-transaction undo shadow (spec §4.6 properties "SET atomicity").
#[derive(Clone)]
pub struct InMemoryTableHandler {
    rows: Arc<RwLock<BTreeMap<Oid, Value>>>,
    /// `txn_id -> [(oid, value-before-this-transaction)]`, consumed by
    /// `SetUndo`/`SetFree`.
    shadow: Arc<DashMap<u64, Vec<(Oid, Option<Value>)>>>,
}

impl InMemoryTableHandler {
    pub fn new() -> Self {
        Self { rows: Arc::new(RwLock::new(BTreeMap::new())), shadow: Arc::new(DashMap::new()) }
    }

    pub fn seed(&self, oid: Oid, value: Value) {
        self.rows.write().expect("lock poisoned").insert(oid, value);
    }

    pub fn get(&self, oid: &Oid) -> Option<Value> {
        self.rows.read().expect("lock poisoned").get(oid).cloned()
    }

    fn same_type(a: &Value, b: &Value) -> bool {
        a.type_name() == b.type_name()
    }
}

impl Default for InMemoryTableHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for InMemoryTableHandler {
    fn invoke(&self, mode: RequestMode, txn_id: u64, requests: &[Varbind]) -> HandlerOutcome {
        match mode {
            RequestMode::Get => {
                let rows = self.rows.read().expect("lock poisoned");
                HandlerOutcome::Done(
                    requests
                        .iter()
                        .map(|r| Varbind::new(r.oid.clone(), rows.get(&r.oid).cloned().unwrap_or(Value::NoSuchInstance)))
                        .collect(),
                )
            },
            RequestMode::GetNext | RequestMode::GetBulk => {
                let rows = self.rows.read().expect("lock poisoned");
                HandlerOutcome::Done(
                    requests
                        .iter()
                        .map(|r| match rows.range((std::ops::Bound::Excluded(r.oid.clone()), std::ops::Bound::Unbounded)).next() {
                            Some((oid, value)) => Varbind::new(oid.clone(), value.clone()),
                            None => Varbind::new(r.oid.clone(), Value::EndOfMibView),
                        })
                        .collect(),
                )
            },
            RequestMode::SetReserve1 => {
                let rows = self.rows.read().expect("lock poisoned");
                for (index, r) in requests.iter().enumerate() {
                    match rows.get(&r.oid) {
                        Some(existing) if !Self::same_type(existing, &r.value) => {
                            return HandlerOutcome::Error { status: PriotError::WrongType, index };
                        },
                        None => return HandlerOutcome::Error { status: PriotError::NoSuchName, index },
                        _ => {},
                    }
                }
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetReserve2 => HandlerOutcome::Done(requests.to_vec()),
            RequestMode::SetAction => {
                let mut rows = self.rows.write().expect("lock poisoned");
                let mut undo = Vec::with_capacity(requests.len());
                for r in requests {
                    undo.push((r.oid.clone(), rows.get(&r.oid).cloned()));
                    rows.insert(r.oid.clone(), r.value.clone());
                }
                self.shadow.insert(txn_id, undo);
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetCommit => {
                self.shadow.remove(&txn_id);
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetUndo => {
                if let Some((_, undo)) = self.shadow.remove(&txn_id) {
                    let mut rows = self.rows.write().expect("lock poisoned");
                    for (oid, before) in undo {
                        match before {
                            Some(value) => {
                                rows.insert(oid, value);
                            },
                            None => {
                                rows.remove(&oid);
                            },
                        }
                    }
                }
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetFree => {
                self.shadow.remove(&txn_id);
                HandlerOutcome::Done(requests.to_vec())
            },
        }
    }
}

/// The non-status columns used to populate a freshly `createAndGo`/
/// `createAndWait`-ed `vacmAccessTable` row; `row_status` itself is
/// decided by the transition, not supplied here.
#[derive(Debug, Clone)]
pub struct AccessRowDefaults {
    pub read_view: String,
    pub write_view: String,
    pub notify_view: String,
    pub storage_type: StorageType,
}

/// Exposes one `vacmAccessStatus` instance backed by a single,
/// fixed-key `vacmAccessTable` row, so a SET against it drives that row
/// through RFC 2579's row-status life cycle (spec §4.5's "SET-driven
/// row creation" and §4.6's delegating-handler contract): `createAndGo`/
/// `createAndWait` materializes the row, `destroy` removes it, and
/// everything in between follows `RowStatus::transition`.
#[derive(Clone)]
pub struct AccessRowStatusHandler {
    instance: Oid,
    access: Arc<AccessTable>,
    key: (String, String, Option<SecurityModel>, SecurityLevel),
    defaults: Arc<AccessRowDefaults>,
    /// `txn_id -> row status before this transaction's SetAction`, `None`
    /// meaning the row did not exist until this transaction created it
    /// — consumed by `SetUndo` to reverse exactly that.
    shadow: Arc<DashMap<u64, Option<RowStatus>>>,
}

impl AccessRowStatusHandler {
    pub fn new(
        instance: Oid,
        access: Arc<AccessTable>,
        key: (String, String, Option<SecurityModel>, SecurityLevel),
        defaults: AccessRowDefaults,
    ) -> Self {
        Self { instance, access, key, defaults: Arc::new(defaults), shadow: Arc::new(DashMap::new()) }
    }

    fn make_default(&self) -> AccessEntry {
        AccessEntry {
            group_name: self.key.0.clone(),
            context_prefix: self.key.1.clone(),
            security_model: self.key.2,
            security_level: self.key.3,
            context_match: ContextMatch::Exact,
            read_view: self.defaults.read_view.clone(),
            write_view: self.defaults.write_view.clone(),
            notify_view: self.defaults.notify_view.clone(),
            storage_type: self.defaults.storage_type,
            row_status: RowStatus::NotReady,
        }
    }

    fn current(&self, oid: &Oid) -> Value {
        if *oid == self.instance {
            match self.access.row_status_of(&self.key) {
                Some(status) => Value::Integer32(status.to_i32()),
                None => Value::NoSuchInstance,
            }
        } else {
            Value::NoSuchInstance
        }
    }
}

impl Handler for AccessRowStatusHandler {
    fn invoke(&self, mode: RequestMode, txn_id: u64, requests: &[Varbind]) -> HandlerOutcome {
        match mode {
            RequestMode::Get => {
                HandlerOutcome::Done(requests.iter().map(|r| Varbind::new(r.oid.clone(), self.current(&r.oid))).collect())
            },
            RequestMode::GetNext | RequestMode::GetBulk => HandlerOutcome::Done(
                requests
                    .iter()
                    .map(|r| {
                        if r.oid < self.instance {
                            match self.access.row_status_of(&self.key) {
                                Some(status) => Varbind::new(self.instance.clone(), Value::Integer32(status.to_i32())),
                                None => Varbind::new(r.oid.clone(), Value::EndOfMibView),
                            }
                        } else {
                            Varbind::new(r.oid.clone(), Value::EndOfMibView)
                        }
                    })
                    .collect(),
            ),
            RequestMode::SetReserve1 => {
                for (index, r) in requests.iter().enumerate() {
                    if r.oid != self.instance {
                        return HandlerOutcome::Error { status: PriotError::NoSuchName, index };
                    }
                    let code = match r.value {
                        Value::Integer32(v) => v,
                        _ => return HandlerOutcome::Error { status: PriotError::WrongType, index },
                    };
                    if let Err(status) = RowStatus::from_i32(code) {
                        return HandlerOutcome::Error { status, index };
                    }
                }
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetReserve2 => HandlerOutcome::Done(requests.to_vec()),
            RequestMode::SetAction => {
                let mut applied = Vec::with_capacity(requests.len());
                for (index, r) in requests.iter().enumerate() {
                    let code = match r.value {
                        Value::Integer32(v) => v,
                        _ => return HandlerOutcome::Error { status: PriotError::WrongType, index },
                    };
                    let next = match RowStatus::from_i32(code) {
                        Ok(s) => s,
                        Err(status) => return HandlerOutcome::Error { status, index },
                    };
                    match self.access.set_row_status(self.key.clone(), next, true, || self.make_default()) {
                        Ok(previous) => {
                            self.shadow.insert(txn_id, previous);
                            applied.push(r.clone());
                        },
                        Err(status) => return HandlerOutcome::Error { status, index },
                    }
                }
                HandlerOutcome::Done(applied)
            },
            RequestMode::SetCommit => {
                self.shadow.remove(&txn_id);
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetUndo => {
                if let Some((_, previous)) = self.shadow.remove(&txn_id) {
                    match previous {
                        Some(status) => self.access.force_row_status(&self.key, status),
                        None => self.access.remove(&self.key.0, &self.key.1, self.key.2, self.key.3),
                    }
                }
                HandlerOutcome::Done(requests.to_vec())
            },
            RequestMode::SetFree => {
                self.shadow.remove(&txn_id);
                HandlerOutcome::Done(requests.to_vec())
            },
        }
    }
}

/// Closed set of built-in handler kinds a subtree registration can carry.
/// `Clone` is cheap: every variant wraps `Arc`-backed interior state.
#[enum_dispatch(Handler)]
#[derive(Clone)]
pub enum HandlerKind {
    Scalar(ScalarHandler),
    Counters(CounterGroupHandler),
    Table(InMemoryTableHandler),
    AccessRowStatus(AccessRowStatusHandler),
}
