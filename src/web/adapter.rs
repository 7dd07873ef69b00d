//! Request adapter for mapping HTTP requests to gate input.

use serde_json::{Map, Value};

use super::{GateInput, HttpMethod};

/// Owned, framework-agnostic request data.
///
/// `RequestAdapter` is the simplest way to feed a [`Guard`](crate::Guard):
/// framework code copies the method, the parsed JSON body and the
/// route/query parameters into it. Tests use it directly.
///
/// The body starts as an empty JSON object, as a body parser yields for an
/// empty request. Params are always a JSON object.
///
/// # Examples
///
/// ```
/// use policy_gate::web::{GateInput, RequestAdapter};
/// use policy_gate::HttpMethod;
/// use serde_json::json;
///
/// let mut adapter = RequestAdapter::new(HttpMethod::Get);
/// adapter.add_param("id", "42");
///
/// assert_eq!(adapter.params(), &json!({ "id": "42" }));
/// assert_eq!(adapter.body(), &json!({}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAdapter {
    method: HttpMethod,
    body: Value,
    params: Value,
}

impl RequestAdapter {
    /// Creates an adapter with an empty body and no params.
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: Value::Object(Map::new()),
            params: Value::Object(Map::new()),
        }
    }

    /// Sets the parsed body, returning the adapter for chaining.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Replaces the parsed body.
    pub fn set_body(&mut self, body: Value) {
        self.body = body;
    }

    /// Adds (or replaces) a path or query parameter.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Object(params) = &mut self.params {
            params.insert(key.into(), value.into());
        }
    }

    /// Adds a parameter, returning the adapter for chaining.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_param(key, value);
        self
    }
}

impl GateInput for RequestAdapter {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn body(&self) -> &Value {
        &self.body
    }

    fn params(&self) -> &Value {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_adapter_new() {
        let adapter = RequestAdapter::new(HttpMethod::Post);
        assert_eq!(adapter.method(), HttpMethod::Post);
        assert_eq!(adapter.body(), &json!({}));
        assert_eq!(adapter.params(), &json!({}));
    }

    #[test]
    fn request_adapter_with_body() {
        let adapter = RequestAdapter::new(HttpMethod::Put).with_body(json!({ "id": 7 }));
        assert_eq!(adapter.body(), &json!({ "id": 7 }));
    }

    #[test]
    fn later_params_replace_earlier_ones() {
        let mut adapter = RequestAdapter::new(HttpMethod::Get);
        adapter.add_param("page", "1");
        adapter.add_param("page", 2);

        assert_eq!(adapter.params(), &json!({ "page": 2 }));
    }

    #[test]
    fn set_body_replaces_the_body() {
        let mut adapter = RequestAdapter::new(HttpMethod::Patch).with_param("id", "3");
        adapter.set_body(json!([1, 2]));

        assert_eq!(adapter.body(), &json!([1, 2]));
        assert_eq!(adapter.params(), &json!({ "id": "3" }));
    }
}
