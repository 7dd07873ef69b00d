use crate::web::HttpMethod;

/// Default cap on buffered request bodies (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Settings that shape how a [`Gate`](crate::Gate) treats requests.
///
/// # Examples
///
/// ```
/// use policy_gate::{GateConfig, HttpMethod};
///
/// let config = GateConfig::default()
///     .with_body_methods([HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch, HttpMethod::Delete])
///     .with_failure_status(422);
///
/// assert!(config.validates_body(HttpMethod::Delete));
/// assert!(!config.validates_body(HttpMethod::Get));
/// assert_eq!(config.failure_status(), 422);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    body_methods: Vec<HttpMethod>,
    failure_status: u16,
    failure_message: String,
    body_limit: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            body_methods: vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch],
            failure_status: 400,
            failure_message: "Validation failed".to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl GateConfig {
    /// Sets the methods whose body is validated. All others validate params.
    pub fn with_body_methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.body_methods = methods.into_iter().collect();
        self
    }

    /// Sets the status code of rejection responses.
    pub fn with_failure_status(mut self, status: u16) -> Self {
        self.failure_status = status;
        self
    }

    /// Sets the `message` of rejection responses.
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Sets the maximum number of body bytes buffered by framework integrations.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Returns `true` if requests with `method` are validated against their body.
    pub fn validates_body(&self, method: HttpMethod) -> bool {
        self.body_methods.contains(&method)
    }

    /// Returns the methods whose body is validated.
    pub fn body_methods(&self) -> &[HttpMethod] {
        &self.body_methods
    }

    /// Returns the status code of rejection responses.
    pub fn failure_status(&self) -> u16 {
        self.failure_status
    }

    /// Returns the `message` of rejection responses.
    pub fn failure_message(&self) -> &str {
        &self.failure_message
    }

    /// Returns the body buffering limit in bytes.
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}
