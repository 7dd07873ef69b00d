use std::sync::Arc;

use serde_json::Value;

use crate::config::GateConfig;
use crate::engine::{RuleEngine, Validate};
use crate::gate::Gate;
use crate::path::PolicyPath;
use crate::policy::{Policy, PolicyFragment, PolicyNode};

/// The mutable, setup-time collection of policies.
///
/// Application startup creates a registry, registers fragments into it, and
/// then calls [`freeze`](Self::freeze) to obtain a read-only [`Gate`] for
/// serving. Freezing consumes the registry, so no policy can change once
/// requests are being handled.
///
/// Registration deep-merges: fragments that share a path prefix keep each
/// other's siblings. When two registrations put a policy at the same path,
/// the later policy replaces the earlier one as a whole. Rules are never
/// merged field by field.
///
/// # Examples
///
/// ```
/// use policy_gate::{create_policy, PolicyPath, PolicyRegistry, RuleSet};
///
/// let create = PolicyPath::parse("users.create").unwrap();
/// let update = PolicyPath::parse("users.update").unwrap();
///
/// let mut registry = PolicyRegistry::new();
/// registry.register_all([
///     create_policy(&create, RuleSet::new().with("email", "required|email")),
///     create_policy(&update, RuleSet::new().with("id", "required|integer")),
/// ]);
///
/// assert_eq!(registry.len(), 2);
/// assert!(registry.contains(&create));
///
/// let gate = registry.freeze();
/// assert!(gate.policy(&update).is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRegistry {
    root: PolicyNode,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one fragment into the registry.
    ///
    /// Returns the registry to allow chaining.
    pub fn register(&mut self, fragment: PolicyFragment) -> &mut Self {
        let incoming = fragment.len();
        let mut replaced = Vec::new();
        self.root.merge(fragment.into_root(), "", &mut replaced);

        for path in &replaced {
            tracing::warn!(policy = %path, "replacing previously registered policy");
        }
        tracing::debug!(
            policies = incoming,
            replaced = replaced.len(),
            total = self.len(),
            "registered policy fragment"
        );
        self
    }

    /// Merges fragments in order, as if [`register`](Self::register) were
    /// called on each.
    pub fn register_all<I>(&mut self, fragments: I) -> &mut Self
    where
        I: IntoIterator<Item = PolicyFragment>,
    {
        for fragment in fragments {
            self.register(fragment);
        }
        self
    }

    /// Returns the policy registered at `path`.
    pub fn get(&self, path: &PolicyPath) -> Option<&Policy> {
        self.root.get(path)
    }

    /// Returns `true` if a policy is registered at `path`.
    pub fn contains(&self, path: &PolicyPath) -> bool {
        self.get(path).is_some()
    }

    /// Returns the number of registered policies.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// Returns `true` if no policy is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the paths of all registered policies, sorted.
    pub fn paths(&self) -> Vec<PolicyPath> {
        let mut out = Vec::new();
        self.root.collect_paths("", &mut out);
        out
    }

    /// Renders the registry in fragment JSON shape.
    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }

    /// Freezes the registry into a gate using [`RuleEngine`] and the default
    /// [`GateConfig`].
    pub fn freeze(self) -> Gate {
        self.freeze_with(RuleEngine, GateConfig::default())
    }

    /// Freezes the registry into a gate with a custom engine and config.
    pub fn freeze_with(self, engine: impl Validate + 'static, config: GateConfig) -> Gate {
        tracing::debug!(policies = self.len(), "freezing policy registry");
        Gate::new(self.root, Arc::new(engine), config)
    }
}

impl Extend<PolicyFragment> for PolicyRegistry {
    fn extend<I: IntoIterator<Item = PolicyFragment>>(&mut self, iter: I) {
        self.register_all(iter);
    }
}

impl FromIterator<PolicyFragment> for PolicyRegistry {
    fn from_iter<I: IntoIterator<Item = PolicyFragment>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.register_all(iter);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::create_policy;
    use crate::rules::RuleSet;
    use serde_json::json;

    fn path(raw: &str) -> PolicyPath {
        PolicyPath::parse(raw).unwrap()
    }

    fn id_rules() -> RuleSet {
        RuleSet::new().with("id", "required|integer")
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = PolicyRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.to_json(), json!({}));
    }

    #[test]
    fn single_registration_reads_back() {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path("test.deep"), id_rules()));

        assert_eq!(registry.get(&path("test.deep")).unwrap().rules(), &id_rules());
        assert_eq!(
            registry.to_json(),
            json!({ "test": { "deep": { "rules": { "id": "required|integer" } } } })
        );
    }

    #[test]
    fn disjoint_prefixes_are_kept_independently() {
        let mut registry = PolicyRegistry::new();
        registry
            .register(create_policy(&path("a.b"), id_rules()))
            .register(create_policy(&path("c.d"), RuleSet::new().with("name", "string")));

        assert_eq!(registry.paths(), vec![path("a.b"), path("c.d")]);
        assert_eq!(registry.get(&path("a.b")).unwrap().rules(), &id_rules());
    }

    #[test]
    fn shared_prefixes_keep_siblings() {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path("users.create"), id_rules()));
        registry.register(create_policy(&path("users.update"), id_rules()));
        registry.register(create_policy(&path("users"), RuleSet::new().with("q", "string")));

        assert_eq!(
            registry.paths(),
            vec![path("users"), path("users.create"), path("users.update")]
        );
    }

    #[test]
    fn register_all_matches_sequential_register() {
        let fragments = vec![
            create_policy(&path("test.deep.index"), id_rules()),
            create_policy(&path("test2.deep.index"), id_rules()),
            create_policy(&path("test.deep.index"), RuleSet::new().with("name", "required")),
        ];

        let mut batched = PolicyRegistry::new();
        batched.register_all(fragments.clone());

        let mut sequential = PolicyRegistry::new();
        for fragment in fragments {
            sequential.register(fragment);
        }

        assert_eq!(batched, sequential);
    }

    #[test]
    fn colliding_paths_replace_the_whole_rule_set() {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(
            &path("users.create"),
            RuleSet::new().with("id", "required").with("name", "string"),
        ));
        registry.register(create_policy(
            &path("users.create"),
            RuleSet::new().with("id", "integer"),
        ));

        let rules = registry.get(&path("users.create")).unwrap().rules();
        assert_eq!(rules, &RuleSet::new().with("id", "integer"));
        assert!(rules.get("name").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn collects_from_fragments() {
        let registry: PolicyRegistry = [
            create_policy(&path("a"), id_rules()),
            create_policy(&path("b"), id_rules()),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.len(), 2);
    }

    mod proptests {
        use super::*;
        use crate::test_utils::{arb_policy_path, arb_rule_set};
        use proptest::prelude::*;

        proptest! {
            /// Property: a freshly registered policy is always readable at its path
            #[test]
            fn proptest_register_then_get(
                base in prop::collection::vec((arb_policy_path(), arb_rule_set()), 0..6),
                path in arb_policy_path(),
                rules in arb_rule_set()
            ) {
                let mut registry: PolicyRegistry = base
                    .iter()
                    .map(|(p, r)| create_policy(p, r.clone()))
                    .collect();
                registry.register(create_policy(&path, rules.clone()));

                prop_assert_eq!(registry.get(&path).map(Policy::rules), Some(&rules));
            }

            /// Property: registering never loses a policy at a different path
            #[test]
            fn proptest_register_preserves_other_paths(
                first in arb_policy_path(),
                second in arb_policy_path(),
                rules in arb_rule_set()
            ) {
                prop_assume!(first != second);

                let mut registry = PolicyRegistry::new();
                registry.register(create_policy(&first, rules.clone()));
                registry.register(create_policy(&second, RuleSet::new().with("other", "string")));

                prop_assert_eq!(registry.get(&first).map(Policy::rules), Some(&rules));
                prop_assert_eq!(registry.len(), 2);
            }
        }
    }
}
