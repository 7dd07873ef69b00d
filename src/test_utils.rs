//! Proptest strategies shared by unit tests.

use proptest::prelude::*;

use crate::path::PolicyPath;
use crate::rules::RuleSet;

/// A single valid path segment.
pub(crate) fn arb_segment() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,7}")
        .unwrap()
        .prop_filter("reserved segment", |segment| segment != "rules")
}

/// A valid dotted path of one to four segments.
pub(crate) fn arb_policy_path() -> impl Strategy<Value = PolicyPath> {
    prop::collection::vec(arb_segment(), 1..5)
        .prop_map(|segments| PolicyPath::parse(segments.join(".")).expect("segments are valid"))
}

/// A rule set built from known-good rules.
pub(crate) fn arb_rule_set() -> impl Strategy<Value = RuleSet> {
    let expr = prop_oneof![
        Just("required"),
        Just("required|integer"),
        Just("string|max:32"),
        Just("numeric|between:1,10"),
        Just("in:a,b,c"),
    ];
    prop::collection::btree_map(arb_segment(), expr, 0..4)
        .prop_map(|fields| fields.into_iter().collect())
}
