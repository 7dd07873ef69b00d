//! Validation engines.
//!
//! The gate does not evaluate rules itself. It hands the selected request
//! data and a policy's [`RuleSet`] to a [`Validate`] implementation and acts
//! on the returned [`ValidationOutcome`]. [`RuleEngine`] is the default
//! engine and understands the pipe-delimited rule grammar
//! (`"required|integer|min:1"`).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::RuleError;
use crate::rules::RuleSet;

/// A pluggable rule evaluator.
///
/// Implementations MUST:
/// - Report every failing field in the returned outcome
/// - Return `Err(RuleError)` only for rules they cannot evaluate, never for
///   data that fails a rule
///
/// # Examples
///
/// ```
/// use policy_gate::{RuleError, RuleSet, Validate, ValidationOutcome};
/// use serde_json::{json, Value};
///
/// /// Requires every listed field to be present.
/// struct PresenceOnly;
///
/// impl Validate for PresenceOnly {
///     fn validate(&self, data: &Value, rules: &RuleSet) -> Result<ValidationOutcome, RuleError> {
///         let mut outcome = ValidationOutcome::default();
///         for (field, _) in rules.iter() {
///             if data.get(field).is_none() {
///                 outcome.add(field, format!("The {field} field is required."));
///             }
///         }
///         Ok(outcome)
///     }
/// }
///
/// let rules = RuleSet::new().with("id", "anything");
/// let outcome = PresenceOnly.validate(&json!({}), &rules).unwrap();
/// assert!(outcome.failed());
/// ```
pub trait Validate: Send + Sync {
    /// Validates `data` against `rules`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if a rule cannot be evaluated by this engine.
    fn validate(&self, data: &Value, rules: &RuleSet) -> Result<ValidationOutcome, RuleError>;

    /// Checks that every rule in `rules` can be evaluated, without any data.
    ///
    /// Used when routes are wired up. The default accepts everything.
    fn check_rules(&self, rules: &RuleSet) -> Result<(), RuleError> {
        let _ = rules;
        Ok(())
    }
}

/// The result of validating one request.
///
/// Holds the failing fields, each with its messages in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationOutcome {
    /// Records a failure message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if no field failed.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` if at least one field failed.
    pub fn failed(&self) -> bool {
        !self.passed()
    }

    /// Returns the messages for one field.
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    /// Returns all failures, keyed by field.
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// Consumes the outcome, returning all failures keyed by field.
    pub fn into_errors(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern compiles")
});

/// The default validation engine.
///
/// Supported rules:
///
/// | rule | passes when |
/// |------|-------------|
/// | `required` | present, not `null`, not blank, not an empty array |
/// | `present` | the key exists (even if `null`) |
/// | `accepted` | `true`, `1`, `"1"`, `"yes"`, `"on"` or `"true"` |
/// | `integer` | an integer, or a string spelling one |
/// | `numeric` | a number, or a string spelling one |
/// | `string`, `boolean`, `array`, `object` | the value has that type (`boolean` also takes `0`, `1`, `"0"`, `"1"`, `"true"`, `"false"`) |
/// | `alpha`, `alpha_num`, `alpha_dash` | letters / letters and digits / plus `-` and `_` |
/// | `email`, `url` | the string looks like one |
/// | `min:n`, `max:n`, `between:a,b`, `size:n` | the size is in range |
/// | `digits:n` | an integer of exactly `n` digits |
/// | `in:a,b`, `not_in:a,b` | the value is (not) one of the listed values |
/// | `regex:pattern` | the string matches; `/pattern/i` form is accepted |
/// | `same:other`, `different:other` | equal to / different from another field |
/// | `confirmed` | equal to the `<field>_confirmation` field |
///
/// For size rules the size is the numeric value when the field also has
/// `integer` or `numeric`, the character count for strings, and the length
/// for arrays.
///
/// Apart from `required`, `present` and `accepted`, rules are skipped when
/// the field is missing, `null` or the empty string.
///
/// # Examples
///
/// ```
/// use policy_gate::{RuleEngine, RuleSet, Validate};
/// use serde_json::json;
///
/// let rules = RuleSet::new().with("id", "required|integer");
///
/// let outcome = RuleEngine.validate(&json!({ "id": "abc" }), &rules).unwrap();
/// assert_eq!(outcome.field("id").unwrap(), ["The id must be an integer."]);
///
/// assert!(RuleEngine.validate(&json!({ "id": 7 }), &rules).unwrap().passed());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl Validate for RuleEngine {
    fn validate(&self, data: &Value, rules: &RuleSet) -> Result<ValidationOutcome, RuleError> {
        let mut outcome = ValidationOutcome::default();

        for (field, expr) in rules.iter() {
            let parsed = expr
                .rules()
                .iter()
                .map(|rule| Rule::parse(field, rule))
                .collect::<Result<Vec<_>, _>>()?;

            let numeric = parsed
                .iter()
                .any(|rule| matches!(rule, Rule::Integer | Rule::Numeric));
            let value = lookup(data, field);
            let field = Field {
                name: field,
                value,
                numeric,
            };

            for rule in &parsed {
                if !rule.is_implicit() && is_empty(value) {
                    continue;
                }
                if let Some(message) = rule.check(&field, data) {
                    outcome.add(field.name, message);
                }
            }
        }

        Ok(outcome)
    }

    fn check_rules(&self, rules: &RuleSet) -> Result<(), RuleError> {
        for (field, expr) in rules.iter() {
            for rule in expr.rules() {
                Rule::parse(field, rule)?;
            }
        }
        Ok(())
    }
}

/// The field under validation.
struct Field<'a> {
    name: &'a str,
    value: Option<&'a Value>,
    numeric: bool,
}

impl Field<'_> {
    /// Human-readable attribute name used in messages.
    fn attribute(&self) -> String {
        self.name
            .chars()
            .map(|c| if c == '_' || c == '.' { ' ' } else { c })
            .collect()
    }

    /// The size compared by `min`, `max`, `between` and `size`.
    fn size(&self) -> Option<f64> {
        let value = self.value?;
        if self.numeric {
            return as_number(value);
        }
        match value {
            Value::String(s) => Some(s.chars().count() as f64),
            Value::Array(items) => Some(items.len() as f64),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Suffix naming the unit for size messages.
    fn unit(&self) -> &'static str {
        match self.value {
            Some(_) if self.numeric => "",
            Some(Value::String(_)) => " characters",
            Some(Value::Array(_)) => " items",
            _ => "",
        }
    }
}

#[derive(Debug)]
enum Rule<'a> {
    Required,
    Present,
    Accepted,
    Integer,
    Numeric,
    String,
    Boolean,
    Array,
    Object,
    Alpha,
    AlphaNum,
    AlphaDash,
    Email,
    Url,
    Min(f64),
    Max(f64),
    Between(f64, f64),
    Size(f64),
    Digits(usize),
    In(Vec<&'a str>),
    NotIn(Vec<&'a str>),
    Regex(Regex),
    Same(&'a str),
    Different(&'a str),
    Confirmed,
}

impl<'a> Rule<'a> {
    fn parse(field: &str, rule: &'a str) -> Result<Self, RuleError> {
        let (name, arg) = match rule.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (rule.trim(), None),
        };
        let invalid = |reason: &str| RuleError::InvalidArgument {
            field: field.to_string(),
            rule: name.to_string(),
            reason: reason.to_string(),
        };
        let require_arg = || arg.filter(|a| !a.trim().is_empty()).ok_or_else(|| invalid("missing argument"));
        let number = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| invalid("expected a number"))
        };
        let list = |raw: &'a str| raw.split(',').map(str::trim).collect::<Vec<_>>();

        let parsed = match name {
            "required" => Rule::Required,
            "present" => Rule::Present,
            "accepted" => Rule::Accepted,
            "integer" => Rule::Integer,
            "numeric" => Rule::Numeric,
            "string" => Rule::String,
            "boolean" => Rule::Boolean,
            "array" => Rule::Array,
            "object" => Rule::Object,
            "alpha" => Rule::Alpha,
            "alpha_num" => Rule::AlphaNum,
            "alpha_dash" => Rule::AlphaDash,
            "email" => Rule::Email,
            "url" => Rule::Url,
            "confirmed" => Rule::Confirmed,
            "min" => Rule::Min(number(require_arg()?)?),
            "max" => Rule::Max(number(require_arg()?)?),
            "size" => Rule::Size(number(require_arg()?)?),
            "between" => {
                let bounds = list(require_arg()?);
                match bounds.as_slice() {
                    [low, high] => {
                        let (low, high) = (number(*low)?, number(*high)?);
                        if low > high {
                            return Err(invalid("lower bound exceeds upper bound"));
                        }
                        Rule::Between(low, high)
                    }
                    _ => return Err(invalid("expected two comma-separated bounds")),
                }
            }
            "digits" => Rule::Digits(
                require_arg()?
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("expected a digit count"))?,
            ),
            "in" => Rule::In(list(require_arg()?)),
            "not_in" => Rule::NotIn(list(require_arg()?)),
            "regex" => Rule::Regex(compile_pattern(require_arg()?).map_err(|err| invalid(&err))?),
            "same" => Rule::Same(require_arg()?.trim()),
            "different" => Rule::Different(require_arg()?.trim()),
            _ => {
                return Err(RuleError::UnknownRule {
                    field: field.to_string(),
                    rule: name.to_string(),
                })
            }
        };
        Ok(parsed)
    }

    /// Implicit rules run even when the field is empty.
    fn is_implicit(&self) -> bool {
        matches!(self, Rule::Required | Rule::Present | Rule::Accepted)
    }

    /// Returns the failure message, or `None` if the rule passes.
    fn check(&self, field: &Field<'_>, data: &Value) -> Option<String> {
        let attr = field.attribute();
        let value = field.value;
        let text = value.and_then(as_text);

        let passes = match self {
            Rule::Required => match value {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Array(items)) => !items.is_empty(),
                Some(_) => true,
            },
            Rule::Present => value.is_some(),
            Rule::Accepted => matches!(
                value,
                Some(Value::Bool(true))
            ) || matches!(text.as_deref(), Some("1" | "yes" | "on" | "true")),
            Rule::Integer => value.is_some_and(is_integer),
            Rule::Numeric => value.and_then(as_number).is_some(),
            Rule::String => matches!(value, Some(Value::String(_))),
            Rule::Boolean => {
                matches!(value, Some(Value::Bool(_)))
                    || matches!(text.as_deref(), Some("0" | "1" | "true" | "false"))
            }
            Rule::Array => matches!(value, Some(Value::Array(_))),
            Rule::Object => matches!(value, Some(Value::Object(_))),
            Rule::Alpha => text.is_some_and(|s| s.chars().all(char::is_alphabetic)),
            Rule::AlphaNum => text.is_some_and(|s| s.chars().all(char::is_alphanumeric)),
            Rule::AlphaDash => text.is_some_and(|s| {
                s.chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
            }),
            Rule::Email => string_value(value).is_some_and(|s| EMAIL.is_match(s)),
            Rule::Url => string_value(value).is_some_and(|s| URL.is_match(s)),
            Rule::Min(min) => field.size().is_some_and(|size| size >= *min),
            Rule::Max(max) => field.size().is_some_and(|size| size <= *max),
            Rule::Between(low, high) => field
                .size()
                .is_some_and(|size| size >= *low && size <= *high),
            Rule::Size(expected) => field.size().is_some_and(|size| size == *expected),
            Rule::Digits(count) => value
                .filter(|v| is_integer(v))
                .and_then(as_text)
                .is_some_and(|s| {
                    let digits = s.strip_prefix('-').unwrap_or(s.as_str());
                    digits.len() == *count
                }),
            Rule::In(allowed) => text.as_deref().is_some_and(|s| allowed.contains(&s)),
            Rule::NotIn(denied) => text.as_deref().is_some_and(|s| !denied.contains(&s)),
            Rule::Regex(pattern) => text.as_deref().is_some_and(|s| pattern.is_match(s)),
            Rule::Same(other) => value == lookup(data, other),
            Rule::Different(other) => value != lookup(data, other),
            Rule::Confirmed => value == lookup(data, &format!("{}_confirmation", field.name)),
        };

        if passes {
            return None;
        }

        let unit = field.unit();
        Some(match self {
            Rule::Required => format!("The {attr} field is required."),
            Rule::Present => format!("The {attr} field must be present."),
            Rule::Accepted => format!("The {attr} must be accepted."),
            Rule::Integer => format!("The {attr} must be an integer."),
            Rule::Numeric => format!("The {attr} must be a number."),
            Rule::String => format!("The {attr} must be a string."),
            Rule::Boolean => format!("The {attr} field must be true or false."),
            Rule::Array => format!("The {attr} must be an array."),
            Rule::Object => format!("The {attr} must be an object."),
            Rule::Alpha => format!("The {attr} field must contain only alphabetic characters."),
            Rule::AlphaNum => format!("The {attr} field must be alphanumeric."),
            Rule::AlphaDash => format!(
                "The {attr} field may only contain alpha-numeric characters, as well as dashes and underscores."
            ),
            Rule::Email | Rule::Url | Rule::Regex(_) => format!("The {attr} format is invalid."),
            Rule::Min(min) => format!("The {attr} must be at least {min}{unit}."),
            Rule::Max(max) => format!("The {attr} may not be greater than {max}{unit}."),
            Rule::Between(low, high) => {
                format!("The {attr} field must be between {low} and {high}{unit}.")
            }
            Rule::Size(expected) => format!("The {attr} must be {expected}{unit}."),
            Rule::Digits(count) => format!("The {attr} must be {count} digits."),
            Rule::In(_) | Rule::NotIn(_) => format!("The selected {attr} is invalid."),
            Rule::Same(other) => format!("The {attr} and {other} fields must match."),
            Rule::Different(other) => format!("The {attr} and {other} must be different."),
            Rule::Confirmed => format!("The {attr} confirmation does not match."),
        })
    }
}

/// Compiles a `regex:` argument, accepting a bare pattern or `/pattern/flags`.
fn compile_pattern(raw: &str) -> Result<Regex, String> {
    let (pattern, insensitive) = match raw.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
        Some((pattern, flags)) if flags.chars().all(|c| c.is_ascii_alphabetic()) => {
            (pattern, flags.contains('i'))
        }
        _ => (raw, false),
    };
    let pattern = if insensitive {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    Regex::new(&pattern).map_err(|err| err.to_string())
}

/// Resolves a possibly dotted field name inside `data`.
///
/// An exact key match wins; otherwise each segment walks one level into an
/// object (by key) or array (by index).
fn lookup<'v>(data: &'v Value, field: &str) -> Option<&'v Value> {
    if let Some(value) = data.as_object().and_then(|object| object.get(field)) {
        return Some(value);
    }
    if !field.contains('.') {
        return None;
    }
    field.split('.').try_fold(data, |current, segment| match current {
        Value::Object(object) => object.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        Value::String(s) => s
            .parse::<i64>()
            .is_ok_and(|n| n.to_string() == *s),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() && s.trim() == s => {
            s.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

fn string_value(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

/// Scalar values as text, for rules that compare against literals.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
