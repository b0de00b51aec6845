//! Replicated-tree convergence and idempotence

#![cfg(feature = "crdt")]

mod common;

use collabkit_core::crdt::{Doc, Origin};
use collabkit_core::{PatchOutcome, ReplicatedTree, deep_equal, diff, patch_replicated};
use common::{arb_array_pair, arb_object_pair};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_replicated_convergence((old, new) in arb_object_pair()) {
        let doc = Doc::new();
        let tree = ReplicatedTree::map(&doc, "root");
        tree.patch(old, Some(Origin::from("seed"))).unwrap();

        let delta = diff(&tree.to_value().unwrap(), &new).unwrap();
        patch_replicated(&tree, delta, Some(Origin::from("test"))).unwrap();

        let actual = tree.to_value().unwrap();
        prop_assert!(deep_equal(&actual, &new), "{} != {}", actual, new);
    }

    #[test]
    fn test_replicated_convergence_on_array_root((old, new) in arb_array_pair()) {
        let doc = Doc::new();
        let tree = ReplicatedTree::array(&doc, "items");
        tree.patch(old, Some(Origin::from("seed"))).unwrap();

        let delta = diff(&tree.to_value().unwrap(), &new).unwrap();
        patch_replicated(&tree, delta, Some(Origin::from("test"))).unwrap();

        let actual = tree.to_value().unwrap();
        prop_assert!(deep_equal(&actual, &new), "{} != {}", actual, new);
        prop_assert_eq!(tree.patch(new, None).unwrap(), PatchOutcome::Unchanged);
    }

    #[test]
    fn test_replicated_patch_is_idempotent((old, new) in arb_object_pair()) {
        let doc = Doc::new();
        let tree = ReplicatedTree::map(&doc, "root");
        tree.patch(old, None).unwrap();
        tree.patch(new.clone(), None).unwrap();

        let state_vector = tree.encode_state_vector().unwrap();
        prop_assert_eq!(tree.patch(new, None).unwrap(), PatchOutcome::Unchanged);
        prop_assert_eq!(tree.encode_state_vector().unwrap(), state_vector);
    }

    #[test]
    fn test_peer_replays_local_patches((old, new) in arb_object_pair()) {
        let local = ReplicatedTree::map(&Doc::new(), "root");
        let remote = ReplicatedTree::map(&Doc::new(), "root");

        local.patch(old, None).unwrap();
        remote.apply_update(&local.encode_state_as_update().unwrap(), None).unwrap();

        let remote_sv = remote.encode_state_vector().unwrap();
        local.patch(new.clone(), None).unwrap();
        remote.apply_update(&local.encode_diff(&remote_sv).unwrap(), None).unwrap();

        prop_assert!(deep_equal(&remote.to_value().unwrap(), &new));
    }
}
