//! Extraction boundary trait for web integration.
//!
//! This module defines what a guard needs to read from a framework-specific
//! request type.

use serde_json::Value;

use super::HttpMethod;

/// Request data a [`Guard`](crate::Guard) validates.
///
/// Framework integrations implement this for their request type, or build a
/// [`RequestAdapter`](super::RequestAdapter) from it. A guard reads
/// [`method`](Self::method) to decide whether to validate the
/// [`body`](Self::body) or the [`params`](Self::params).
///
/// # Design Notes
///
/// This trait only maps framework types to JSON values. It does not parse
/// bodies, look up policies or decide anything about validity.
///
/// # Examples
///
/// ```
/// use policy_gate::web::GateInput;
/// use policy_gate::HttpMethod;
/// use serde_json::{json, Value};
///
/// struct MyFrameworkRequest {
///     verb: &'static str,
///     json: Value,
///     route_params: Value,
/// }
///
/// impl GateInput for MyFrameworkRequest {
///     fn method(&self) -> HttpMethod {
///         HttpMethod::from_name(self.verb)
///     }
///     fn body(&self) -> &Value {
///         &self.json
///     }
///     fn params(&self) -> &Value {
///         &self.route_params
///     }
/// }
///
/// let req = MyFrameworkRequest { verb: "post", json: json!({ "id": 1 }), route_params: json!({}) };
/// assert_eq!(req.method(), HttpMethod::Post);
/// ```
pub trait GateInput {
    /// The request method.
    fn method(&self) -> HttpMethod;

    /// The parsed request body.
    fn body(&self) -> &Value;

    /// The path and query parameters.
    fn params(&self) -> &Value;
}

impl<T: GateInput + ?Sized> GateInput for &T {
    fn method(&self) -> HttpMethod {
        (**self).method()
    }

    fn body(&self) -> &Value {
        (**self).body()
    }

    fn params(&self) -> &Value {
        (**self).params()
    }
}
