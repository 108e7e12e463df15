// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Oid` ordering and prefix semantics (spec §3 "OIDs compare
//! lexicographically"), exercised only through the public API.

use priot_core::{data::oid::Oid, oid};

#[test]
fn a_prefix_sorts_before_any_of_its_own_extensions() {
    let prefix = oid!(1, 3, 6, 1, 2, 1, 1);
    let child = oid!(1, 3, 6, 1, 2, 1, 1, 0);
    assert!(prefix < child);
    assert!(prefix.is_prefix_of(&child));
    assert!(!child.is_prefix_of(&prefix));
}

#[test]
fn siblings_compare_by_their_diverging_sub_identifier() {
    let a = oid!(1, 3, 6, 1, 2, 1, 1, 1);
    let b = oid!(1, 3, 6, 1, 2, 1, 1, 2);
    assert!(a < b);
    assert!(!a.is_prefix_of(&b));
}

#[test]
fn sorting_a_mixed_set_matches_registry_traversal_order() {
    let mut oids = vec![
        oid!(1, 3, 6, 1, 2, 1, 2),
        oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
        oid!(1, 3, 6, 1, 2, 1, 1),
        oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
    ];
    oids.sort();
    assert_eq!(
        oids,
        vec![
            oid!(1, 3, 6, 1, 2, 1, 1),
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
            oid!(1, 3, 6, 1, 2, 1, 2),
        ]
    );
}

#[test]
fn degenerate_lengths_are_rejected_at_the_boundary() {
    assert!(Oid::new(vec![1]).is_err());
    assert!(Oid::new(vec![1, 3]).is_ok());
    assert!(Oid::new(vec![1; 128]).is_ok());
    assert!(Oid::new(vec![1; 129]).is_err());
}

#[test]
fn strip_prefix_returns_the_remaining_sub_identifiers() {
    let base = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1);
    let instance = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 5);
    assert_eq!(instance.strip_prefix(&base), Some(&[10u32, 5][..]));
    assert_eq!(base.strip_prefix(&instance), None);
}

#[test]
fn display_formats_as_dotted_decimal() {
    let o = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
    assert_eq!(o.to_string(), "1.3.6.1.2.1.1.3.0");
}
