// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The subtree registry caches lookups (spec §4.4), but every mutation
//! must invalidate it wholesale — a stale cache entry would let a newly
//! registered, more specific handler go unseen.

use priot_core::{oid, registry::{node::SubtreeFlags, SubtreeRegistry}};

#[test]
fn a_later_registration_is_visible_despite_a_cached_miss() {
    let reg: SubtreeRegistry<&'static str> = SubtreeRegistry::new();
    reg.insert(oid!(1, 3, 6, 1, 2, 1, 1), None, 0, "", 0, SubtreeFlags::read_only_instance(), "system").expect("registers");

    // Populate the cache with a miss for an unregistered sibling.
    assert!(reg.lookup("", &oid!(1, 3, 6, 1, 2, 1, 2, 0)).is_none());

    reg.insert(oid!(1, 3, 6, 1, 2, 1, 2), None, 0, "", 0, SubtreeFlags::read_only_instance(), "interfaces").expect("registers");

    let (root, handler) = reg.lookup("", &oid!(1, 3, 6, 1, 2, 1, 2, 0)).expect("now registered");
    assert_eq!(root, oid!(1, 3, 6, 1, 2, 1, 2));
    assert_eq!(handler, "interfaces");
}

#[test]
fn removal_invalidates_a_cached_hit() {
    let reg: SubtreeRegistry<&'static str> = SubtreeRegistry::new();
    let id = reg.insert(oid!(1, 3, 6, 1, 4, 1, 1), None, 0, "", 0, SubtreeFlags::read_only_instance(), "enterprise").expect("registers");

    // Populate the cache with a hit.
    assert_eq!(reg.lookup("", &oid!(1, 3, 6, 1, 4, 1, 1, 0)).map(|(_, h)| h), Some("enterprise"));

    assert!(reg.remove(id));
    assert!(reg.lookup("", &oid!(1, 3, 6, 1, 4, 1, 1, 0)).is_none());
}

#[test]
fn a_more_specific_registration_shadows_a_cached_broader_match() {
    let reg: SubtreeRegistry<&'static str> = SubtreeRegistry::new();
    reg.insert(oid!(1, 3, 6, 1, 2, 1, 1), None, 0, "", 0, SubtreeFlags::read_only_instance(), "system-wide").expect("registers");

    let instance = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
    assert_eq!(reg.lookup("", &instance).map(|(_, h)| h), Some("system-wide"));

    reg.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3), None, 0, "", 0, SubtreeFlags::read_only_instance(), "sys-up-time").expect("registers");
    assert_eq!(reg.lookup("", &instance).map(|(_, h)| h), Some("sys-up-time"));
}
