//! Rejection responses and the response seam.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The response sent when request data fails its policy.
///
/// Serializes as
/// `{"status": 400, "message": "Validation failed", "errors": {"id": ["..."]}}`.
///
/// # Examples
///
/// ```
/// use policy_gate::web::Rejection;
/// use serde_json::json;
/// use std::collections::BTreeMap;
///
/// let mut errors = BTreeMap::new();
/// errors.insert("id".to_string(), vec!["The id field is required.".to_string()]);
///
/// let rejection = Rejection::new(400, "Validation failed", errors);
/// assert_eq!(
///     rejection.to_json(),
///     json!({
///         "status": 400,
///         "message": "Validation failed",
///         "errors": { "id": ["The id field is required."] }
///     })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    status: u16,
    message: String,
    errors: BTreeMap<String, Vec<String>>,
}

impl Rejection {
    /// Creates a rejection.
    pub fn new(
        status: u16,
        message: impl Into<String>,
        errors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            errors,
        }
    }

    /// Returns the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the summary message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the failure messages keyed by field.
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// Renders the response body.
    pub fn to_json(&self) -> Value {
        let errors = self
            .errors
            .iter()
            .map(|(field, messages)| {
                (
                    field.clone(),
                    Value::Array(messages.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("status".to_string(), Value::from(self.status));
        body.insert("message".to_string(), Value::String(self.message.clone()));
        body.insert("errors".to_string(), Value::Object(errors));
        Value::Object(body)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        write!(f, "{} ({})", self.message, fields.join(", "))
    }
}

/// The response half of the host framework's handler convention.
///
/// A guard calls [`respond`](Self::respond) at most once, and only when it
/// rejects the request.
pub trait Respond {
    /// Sends a JSON response with the given status.
    fn respond(&mut self, status: u16, body: Value);
}

/// A [`Respond`] implementation that records what was sent.
///
/// Useful in tests and for frameworks that build their response after the
/// guard has run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseRecorder {
    sent: Option<(u16, Value)>,
}

impl ResponseRecorder {
    /// Creates a recorder with nothing sent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a response was sent.
    pub fn was_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Returns the status of the sent response.
    pub fn status(&self) -> Option<u16> {
        self.sent.as_ref().map(|(status, _)| *status)
    }

    /// Returns the body of the sent response.
    pub fn body(&self) -> Option<&Value> {
        self.sent.as_ref().map(|(_, body)| body)
    }
}

impl Respond for ResponseRecorder {
    fn respond(&mut self, status: u16, body: Value) {
        self.sent = Some((status, body));
    }
}

#[cfg(feature = "axum")]
impl ::axum::response::IntoResponse for Rejection {
    fn into_response(self) -> ::axum::response::Response {
        let status = ::axum::http::StatusCode::from_u16(self.status)
            .unwrap_or(::axum::http::StatusCode::BAD_REQUEST);
        (status, ::axum::Json(self.to_json())).into_response()
    }
}
