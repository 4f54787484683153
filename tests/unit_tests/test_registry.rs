// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use daemon_bridge::registry::ChannelRegistry;

#[test]
fn insert_then_lookup_finds_the_record() {
    let registry = ChannelRegistry::new();
    let record = registry.insert(1).expect("insert");
    assert_eq!(record.id, 1);
    let found = registry.lookup(1).expect("lookup");
    assert_eq!(found.id, 1);
}

#[test]
fn duplicate_insert_fails() {
    let registry = ChannelRegistry::new();
    registry.insert(1).expect("first insert");
    let err = registry.insert(1).unwrap_err();
    assert!(err.to_string().contains("already registered"));
}

#[test]
fn lookup_of_unknown_id_fails() {
    let registry = ChannelRegistry::new();
    let err = registry.lookup(99).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn remove_tears_down_the_record_and_clears_lookup() {
    let registry = ChannelRegistry::new();
    registry.insert(5).expect("insert");
    assert!(registry.remove(5).is_some());
    assert!(registry.lookup(5).is_err());
    assert!(registry.remove(5).is_none());
}

#[test]
fn for_each_lists_every_live_channel_for_shutdown() {
    let registry = ChannelRegistry::new();
    registry.insert(1).expect("insert 1");
    registry.insert(2).expect("insert 2");
    registry.insert(3).expect("insert 3");

    let mut ids = registry.for_each();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(registry.len(), 3);
    assert!(!registry.is_empty());
}
