use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::path::{check_segment, PolicyPath, RULES_KEY};
use crate::rules::{RuleExpr, RuleSet};

/// A validation policy: the rules request data must satisfy.
///
/// Serializes as `{"rules": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    rules: RuleSet,
}

impl Policy {
    /// Creates a policy from a rule set.
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Returns the rules of this policy.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl From<RuleSet> for Policy {
    fn from(rules: RuleSet) -> Self {
        Self::new(rules)
    }
}

/// One node of a policy tree.
///
/// A node may carry a policy of its own and any number of named children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PolicyNode {
    policy: Option<Policy>,
    children: BTreeMap<String, PolicyNode>,
}

impl PolicyNode {
    /// Wraps a policy in the chain of nodes spelled by `path`.
    fn chain(path: &PolicyPath, policy: Policy) -> Self {
        let segments: Vec<&str> = path.segments().collect();
        let mut node = PolicyNode {
            policy: Some(policy),
            children: BTreeMap::new(),
        };
        for segment in segments.into_iter().rev() {
            let mut parent = PolicyNode::default();
            parent.children.insert(segment.to_string(), node);
            node = parent;
        }
        node
    }

    pub(crate) fn get(&self, path: &PolicyPath) -> Option<&Policy> {
        path.segments()
            .try_fold(self, |node, segment| node.children.get(segment))
            .and_then(|node| node.policy.as_ref())
    }

    /// Deep-merges `other` into this node.
    ///
    /// Children merge recursively. A policy in `other` replaces any policy
    /// already at the same node as a whole. Paths whose policy was replaced
    /// are pushed onto `replaced`.
    pub(crate) fn merge(&mut self, other: PolicyNode, at: &str, replaced: &mut Vec<PolicyPath>) {
        if let Some(policy) = other.policy {
            if self.policy.replace(policy).is_some() {
                replaced.push(PolicyPath::from_checked(at.to_string()));
            }
        }
        for (segment, child) in other.children {
            let child_at = if at.is_empty() {
                segment.clone()
            } else {
                format!("{at}.{segment}")
            };
            self.children
                .entry(segment)
                .or_default()
                .merge(child, &child_at, replaced);
        }
    }

    /// Number of policies in this subtree.
    pub(crate) fn count(&self) -> usize {
        usize::from(self.policy.is_some())
            + self.children.values().map(PolicyNode::count).sum::<usize>()
    }

    /// Collects the paths of every policy in this subtree, in sorted order.
    pub(crate) fn collect_paths(&self, at: &str, out: &mut Vec<PolicyPath>) {
        if self.policy.is_some() && !at.is_empty() {
            out.push(PolicyPath::from_checked(at.to_string()));
        }
        for (segment, child) in &self.children {
            let child_at = if at.is_empty() {
                segment.clone()
            } else {
                format!("{at}.{segment}")
            };
            child.collect_paths(&child_at, out);
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(policy) = &self.policy {
            object.insert(RULES_KEY.to_string(), policy.rules.to_json());
        }
        for (segment, child) in &self.children {
            object.insert(segment.clone(), child.to_json());
        }
        Value::Object(object)
    }

    fn from_json(value: &Value, at: &str) -> Result<Self, ConfigError> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed(at, "expected an object"))?;

        let mut node = PolicyNode::default();
        for (key, child) in object {
            if key == RULES_KEY {
                if at.is_empty() {
                    return Err(malformed(at, "rules must be nested under a policy path"));
                }
                node.policy = Some(Policy::new(rules_from_json(child, at)?));
                continue;
            }
            let child_at = if at.is_empty() {
                key.clone()
            } else {
                format!("{at}.{key}")
            };
            check_segment(key).map_err(|reason| malformed(&child_at, reason))?;
            node.children
                .insert(key.clone(), PolicyNode::from_json(child, &child_at)?);
        }
        Ok(node)
    }
}

fn rules_from_json(value: &Value, at: &str) -> Result<RuleSet, ConfigError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed(at, "rules must be an object"))?;

    object
        .iter()
        .map(|(field, expr)| {
            RuleExpr::from_json(expr)
                .map(|expr| (field.clone(), expr))
                .ok_or_else(|| {
                    malformed(
                        at,
                        format!("rules for field '{field}' must be a string or a list of strings"),
                    )
                })
        })
        .collect()
}

fn malformed(at: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::MalformedFragment {
        at: at.to_string(),
        reason: reason.into(),
    }
}

/// A partial policy tree, ready to be merged into a registry.
///
/// Built with [`create_policy`] or parsed from JSON shaped like the tree
/// itself: nested objects keyed by path segment, with a `rules` object at
/// each policy.
///
/// # Examples
///
/// ```
/// use policy_gate::PolicyFragment;
///
/// let fragment: PolicyFragment = r#"{
///     "users": {
///         "create": { "rules": { "email": "required|email" } },
///         "update": { "rules": { "id": "required|integer" } }
///     }
/// }"#
/// .parse()
/// .unwrap();
///
/// assert_eq!(fragment.len(), 2);
/// assert!(fragment.get(&"users.update".parse().unwrap()).is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFragment {
    root: PolicyNode,
}

impl PolicyFragment {
    /// Parses a fragment from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedFragment`] if a node is not an object,
    /// a key is not a valid path segment, `rules` appears at the top level,
    /// or a rule expression is neither a string nor a list of strings.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        Ok(Self {
            root: PolicyNode::from_json(value, "")?,
        })
    }

    /// Renders the fragment in its JSON shape.
    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }

    /// Returns the policy at `path`, if the fragment contains one.
    pub fn get(&self, path: &PolicyPath) -> Option<&Policy> {
        self.root.get(path)
    }

    /// Returns the number of policies in the fragment.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// Returns `true` if the fragment contains no policies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the paths of all policies in the fragment, sorted.
    pub fn paths(&self) -> Vec<PolicyPath> {
        let mut out = Vec::new();
        self.root.collect_paths("", &mut out);
        out
    }

    pub(crate) fn into_root(self) -> PolicyNode {
        self.root
    }
}

impl FromStr for PolicyFragment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value =
            serde_json::from_str(s).map_err(|err| malformed("", format!("invalid JSON: {err}")))?;
        Self::from_json(&value)
    }
}

impl Serialize for PolicyFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PolicyFragment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Builds a fragment holding `rules` at `path` and nothing else.
///
/// # Examples
///
/// ```
/// use policy_gate::{create_policy, PolicyPath, RuleSet};
/// use serde_json::json;
///
/// let path = PolicyPath::parse("users.create").unwrap();
/// let fragment = create_policy(&path, RuleSet::new().with("id", "required|integer"));
///
/// assert_eq!(
///     fragment.to_json(),
///     json!({ "users": { "create": { "rules": { "id": "required|integer" } } } })
/// );
/// ```
pub fn create_policy(path: &PolicyPath, rules: RuleSet) -> PolicyFragment {
    PolicyFragment {
        root: PolicyNode::chain(path, Policy::new(rules)),
    }
}
