use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// The rules attached to a single field, in evaluation order.
///
/// Written either as a pipe-delimited string (`"required|integer"`) or, when
/// a rule argument itself contains a `|`, as a list of individual rules.
///
/// # Examples
///
/// ```
/// use policy_gate::RuleExpr;
///
/// let expr = RuleExpr::from("required|integer|min:1");
/// assert_eq!(expr.rules(), ["required", "integer", "min:1"]);
///
/// let expr = RuleExpr::list(["required", "regex:^(yes|no)$"]);
/// assert_eq!(expr.rules().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleExpr {
    rules: Vec<String>,
}

impl RuleExpr {
    /// Splits a pipe-delimited rule string. Blank pieces are dropped.
    pub fn parse(expr: &str) -> Self {
        Self {
            rules: expr
                .split('|')
                .map(str::trim)
                .filter(|rule| !rule.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Builds an expression from individual rules, taken verbatim.
    pub fn list<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the individual rules.
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Returns `true` if one of the rules has the given name.
    pub fn has(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule_name(rule) == name)
    }

    pub(crate) fn to_json(&self) -> Value {
        if self.rules.iter().any(|rule| rule.contains('|')) {
            Value::Array(self.rules.iter().cloned().map(Value::String).collect())
        } else {
            Value::String(self.rules.join("|"))
        }
    }

    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(expr) => Some(Self::parse(expr)),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(|rules| Self { rules }),
            _ => None,
        }
    }
}

/// Returns the name part of a rule (`"min"` for `"min:3"`).
pub(crate) fn rule_name(rule: &str) -> &str {
    rule.split_once(':').map_or(rule, |(name, _)| name).trim()
}

impl From<&str> for RuleExpr {
    fn from(expr: &str) -> Self {
        Self::parse(expr)
    }
}

impl From<String> for RuleExpr {
    fn from(expr: String) -> Self {
        Self::parse(&expr)
    }
}

impl Serialize for RuleExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).ok_or_else(|| {
            serde::de::Error::custom("rule expression must be a string or a list of strings")
        })
    }
}

/// A rules object: field name to rule expression.
///
/// Field names may be dotted (`user.email`) to reach into nested request
/// data. Fields are kept sorted by name.
///
/// # Examples
///
/// ```
/// use policy_gate::RuleSet;
///
/// let rules = RuleSet::new()
///     .with("id", "required|integer")
///     .with("name", "string|max:64");
///
/// assert_eq!(rules.len(), 2);
/// assert!(rules.get("id").unwrap().has("integer"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    fields: BTreeMap<String, RuleExpr>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rules for a field, returning the set for chaining.
    pub fn with(mut self, field: impl Into<String>, expr: impl Into<RuleExpr>) -> Self {
        self.insert(field, expr);
        self
    }

    /// Sets the rules for a field, returning the previous rules if any.
    pub fn insert(&mut self, field: impl Into<String>, expr: impl Into<RuleExpr>) -> Option<RuleExpr> {
        self.fields.insert(field.into(), expr.into())
    }

    /// Returns the rules for a field.
    pub fn get(&self, field: &str) -> Option<&RuleExpr> {
        self.fields.get(field)
    }

    /// Iterates over `(field, rules)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleExpr)> {
        self.fields.iter().map(|(field, expr)| (field.as_str(), expr))
    }

    /// Returns the number of fields with rules.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field has rules.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(field, expr)| (field.clone(), expr.to_json()))
                .collect(),
        )
    }
}

impl<K, V> FromIterator<(K, V)> for RuleSet
where
    K: Into<String>,
    V: Into<RuleExpr>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(field, expr)| (field.into(), expr.into()))
                .collect(),
        }
    }
}
