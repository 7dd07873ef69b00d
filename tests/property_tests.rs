//! Integration property tests for policy-gate.
//!
//! These tests validate cross-module invariants and end-to-end flows
//! using property-based testing.

use policy_gate::web::{RequestAdapter, ResponseRecorder};
use policy_gate::{
    create_policy, Decision, HttpMethod, PolicyPath, PolicyRegistry, RuleSet,
};
use proptest::prelude::*;
use serde_json::json;

// Strategy: Generate arbitrary valid path segments
fn arb_segment() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,6}")
        .unwrap()
        .prop_filter("reserved segment", |s| s != "rules")
}

// Strategy: Generate arbitrary dotted policy paths
fn arb_path() -> impl Strategy<Value = PolicyPath> {
    prop::collection::vec(arb_segment(), 1..4)
        .prop_map(|segments| PolicyPath::parse(segments.join(".")).unwrap())
}

// Strategy: Generate arbitrary HTTP methods
fn arb_method() -> impl Strategy<Value = HttpMethod> {
    prop_oneof![
        Just(HttpMethod::Get),
        Just(HttpMethod::Head),
        Just(HttpMethod::Post),
        Just(HttpMethod::Put),
        Just(HttpMethod::Patch),
        Just(HttpMethod::Delete),
        Just(HttpMethod::Options),
    ]
}

proptest! {
    /// Property: a built fragment holds exactly one policy, at its path
    #[test]
    fn proptest_create_policy_only_populates_its_path(
        path in arb_path(),
        other in arb_path()
    ) {
        let fragment = create_policy(&path, RuleSet::new().with("id", "required"));

        prop_assert_eq!(fragment.len(), 1);
        prop_assert!(fragment.get(&path).is_some());
        if other != path {
            prop_assert!(fragment.get(&other).is_none());
        }
    }

    /// Property: register_all is equivalent to registering one at a time
    #[test]
    fn proptest_register_all_equals_sequential(
        entries in prop::collection::vec((arb_path(), arb_segment()), 0..8)
    ) {
        let fragments: Vec<_> = entries
            .iter()
            .map(|(path, field)| create_policy(path, RuleSet::new().with(field.as_str(), "required")))
            .collect();

        let mut batched = PolicyRegistry::new();
        batched.register_all(fragments.clone());

        let mut sequential = PolicyRegistry::new();
        for fragment in fragments {
            sequential.register(fragment);
        }

        prop_assert_eq!(batched.to_json(), sequential.to_json());
    }

    /// Property: the last registration at a path decides its rules
    #[test]
    fn proptest_last_registration_wins_at_leaf(
        path in arb_path(),
        first in arb_segment(),
        second in arb_segment()
    ) {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path, RuleSet::new().with(first.as_str(), "required")));
        registry.register(create_policy(&path, RuleSet::new().with(second.as_str(), "string")));

        let rules = registry.get(&path).unwrap().rules();
        prop_assert_eq!(rules.len(), 1);
        prop_assert!(rules.get(&second).is_some());
    }

    /// Property: a guard either responds or forwards, never both
    ///
    /// Whatever the method and data, a guard for a registered policy sends
    /// a response exactly when it does not call the next handler.
    #[test]
    fn proptest_guard_responds_xor_forwards(
        method in arb_method(),
        id in prop_oneof![
            Just(json!(null)),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z0-9]{0,5}".prop_map(|s| json!(s)),
        ],
        in_body in any::<bool>()
    ) {
        let path = PolicyPath::parse("users.create").unwrap();
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path, RuleSet::new().with("id", "required|integer")));
        let guard = registry.freeze().middleware(path);

        let mut req = RequestAdapter::new(method);
        if in_body {
            req.set_body(json!({ "id": id.clone() }));
        } else {
            req.add_param("id", id.clone());
        }

        let mut res = ResponseRecorder::new();
        let mut forwarded = false;
        guard.handle(&req, &mut res, || forwarded = true).unwrap();

        prop_assert!(forwarded != res.was_sent());

        let decision = guard.check(&req).unwrap();
        prop_assert_eq!(decision == Decision::Forward, forwarded);
    }
}
