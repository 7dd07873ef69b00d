use std::fmt;
use std::sync::Arc;

use crate::{
    config::GateConfig,
    engine::Validate,
    error::{ConfigError, GateError},
    path::PolicyPath,
    policy::{Policy, PolicyNode},
    web::{GateInput, Rejection, Respond},
};

/// The frozen policy registry, ready to serve requests.
///
/// `Gate` is obtained from [`PolicyRegistry::freeze`](crate::PolicyRegistry::freeze)
/// and is cheap to clone; clones share the same policies, engine and config.
/// It hands out one [`Guard`] per route.
///
/// # Examples
///
/// ```
/// use policy_gate::web::RequestAdapter;
/// use policy_gate::{create_policy, Decision, HttpMethod, PolicyPath, PolicyRegistry, RuleSet};
/// use serde_json::json;
///
/// let path = PolicyPath::parse("users.create").unwrap();
/// let mut registry = PolicyRegistry::new();
/// registry.register(create_policy(&path, RuleSet::new().with("id", "required|integer")));
///
/// let gate = registry.freeze();
/// let guard = gate.middleware(path);
///
/// let req = RequestAdapter::new(HttpMethod::Post).with_body(json!({ "id": 7 }));
/// assert_eq!(guard.check(&req).unwrap(), Decision::Forward);
/// ```
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

struct GateInner {
    policies: PolicyNode,
    engine: Arc<dyn Validate>,
    config: GateConfig,
}

impl Gate {
    pub(crate) fn new(policies: PolicyNode, engine: Arc<dyn Validate>, config: GateConfig) -> Self {
        Self {
            inner: Arc::new(GateInner {
                policies,
                engine,
                config,
            }),
        }
    }

    /// Returns a guard for the policy at `path`.
    ///
    /// The policy is looked up when a request arrives. If none is registered
    /// by then, the guard reports [`ConfigError::PolicyNotFound`] for every
    /// request. Use [`try_middleware`](Self::try_middleware) to catch that at
    /// setup time instead.
    pub fn middleware(&self, path: PolicyPath) -> Guard {
        Guard {
            gate: self.clone(),
            path,
        }
    }

    /// Returns a guard for the policy at `path`, checking the wiring first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PolicyNotFound`] if no policy is registered at
    /// `path`, or [`ConfigError::Rule`] if the engine cannot evaluate one of
    /// its rules.
    pub fn try_middleware(&self, path: PolicyPath) -> Result<Guard, ConfigError> {
        let policy = self
            .policy(&path)
            .ok_or_else(|| ConfigError::PolicyNotFound { path: path.clone() })?;
        self.inner.engine.check_rules(policy.rules())?;
        Ok(self.middleware(path))
    }

    /// Returns the policy registered at `path`.
    pub fn policy(&self, path: &PolicyPath) -> Option<&Policy> {
        self.inner.policies.get(path)
    }

    /// Returns the gate configuration.
    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }

    /// Returns the validation engine.
    pub fn engine(&self) -> &dyn Validate {
        self.inner.engine.as_ref()
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("policies", &self.inner.policies.count())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// What a guard decided about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The data satisfied the policy; pass the request on.
    Forward,
    /// The data failed the policy; send this response instead.
    Reject(Rejection),
}

/// The validating middleware for one route.
///
/// Created once per route by [`Gate::middleware`] and invoked for every
/// request. POST, PUT and PATCH requests (by default; see
/// [`GateConfig`]) are validated against their body, all others against
/// their params.
#[derive(Clone, Debug)]
pub struct Guard {
    gate: Gate,
    path: PolicyPath,
}

impl Guard {
    /// Returns the policy path this guard enforces.
    pub fn path(&self) -> &PolicyPath {
        &self.path
    }

    /// Returns the gate configuration.
    pub fn config(&self) -> &GateConfig {
        self.gate.config()
    }

    /// Validates a request and decides whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if no policy is registered at the guard's
    /// path or the engine cannot evaluate the policy's rules. These are
    /// wiring defects, not client errors.
    pub fn check(&self, input: &impl GateInput) -> Result<Decision, ConfigError> {
        let Some(policy) = self.gate.policy(&self.path) else {
            tracing::error!(policy = %self.path, "no policy registered for guarded route");
            return Err(ConfigError::PolicyNotFound {
                path: self.path.clone(),
            });
        };

        let method = input.method();
        let config = self.gate.config();
        let data = if config.validates_body(method) {
            input.body()
        } else {
            input.params()
        };

        let outcome = self
            .gate
            .engine()
            .validate(data, policy.rules())
            .inspect_err(|err| {
                tracing::error!(policy = %self.path, error = %err, "policy rules cannot be evaluated");
            })?;

        if outcome.passed() {
            tracing::debug!(policy = %self.path, %method, "request passed validation");
            return Ok(Decision::Forward);
        }

        let errors = outcome.into_errors();
        tracing::info!(
            policy = %self.path,
            %method,
            fields = errors.len(),
            "request failed validation"
        );
        Ok(Decision::Reject(Rejection::new(
            config.failure_status(),
            config.failure_message(),
            errors,
        )))
    }

    /// Validates a request, turning a rejection into an error.
    ///
    /// Convenient in handlers that propagate with `?`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Validation`] if the data fails the policy and
    /// [`GateError::Config`] for wiring defects.
    pub fn enforce(&self, input: &impl GateInput) -> Result<(), GateError> {
        match self.check(input)? {
            Decision::Forward => Ok(()),
            Decision::Reject(rejection) => Err(GateError::Validation(rejection)),
        }
    }

    /// Runs the guard in request/response/next style.
    ///
    /// On rejection a JSON response is sent through `res` and `next` is not
    /// called. Otherwise `next` is called and nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] without responding if the guard is
    /// misconfigured.
    ///
    /// # Examples
    ///
    /// ```
    /// use policy_gate::web::{RequestAdapter, ResponseRecorder};
    /// use policy_gate::{create_policy, HttpMethod, PolicyPath, PolicyRegistry, RuleSet};
    /// use serde_json::json;
    ///
    /// let path = PolicyPath::parse("users.create").unwrap();
    /// let mut registry = PolicyRegistry::new();
    /// registry.register(create_policy(&path, RuleSet::new().with("id", "required|integer")));
    /// let guard = registry.freeze().middleware(path);
    ///
    /// let mut res = ResponseRecorder::new();
    /// let mut forwarded = false;
    /// let req = RequestAdapter::new(HttpMethod::Post).with_body(json!({}));
    /// guard.handle(&req, &mut res, || forwarded = true).unwrap();
    ///
    /// assert!(!forwarded);
    /// assert_eq!(res.status(), Some(400));
    /// assert!(res.body().unwrap()["errors"]["id"].is_array());
    /// ```
    pub fn handle<R, F>(&self, input: &impl GateInput, res: &mut R, next: F) -> Result<(), ConfigError>
    where
        R: Respond + ?Sized,
        F: FnOnce(),
    {
        match self.check(input)? {
            Decision::Forward => next(),
            Decision::Reject(rejection) => res.respond(rejection.status(), rejection.to_json()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RuleEngine, ValidationOutcome};
    use crate::error::RuleError;
    use crate::policy::create_policy;
    use crate::registry::PolicyRegistry;
    use crate::rules::RuleSet;
    use crate::web::{HttpMethod, RequestAdapter, ResponseRecorder};
    use serde_json::{json, Value};

    fn path(raw: &str) -> PolicyPath {
        PolicyPath::parse(raw).unwrap()
    }

    fn users_gate() -> Gate {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(
            &path("users.create"),
            RuleSet::new().with("id", "required|integer"),
        ));
        registry.freeze()
    }

    fn post(body: Value) -> RequestAdapter {
        RequestAdapter::new(HttpMethod::Post).with_body(body)
    }

    #[test]
    fn missing_policy_is_a_config_error() {
        let guard = users_gate().middleware(path("users.delete"));
        let err = guard.check(&post(json!({ "id": 1 }))).unwrap_err();

        assert_eq!(
            err,
            ConfigError::PolicyNotFound {
                path: path("users.delete")
            }
        );
    }

    #[test]
    fn missing_policy_does_not_respond_or_forward() {
        let guard = users_gate().middleware(path("nope"));
        let mut res = ResponseRecorder::new();
        let mut forwarded = false;

        let result = guard.handle(&post(json!({})), &mut res, || forwarded = true);

        assert!(result.is_err());
        assert!(!res.was_sent());
        assert!(!forwarded);
    }

    #[test]
    fn try_middleware_catches_missing_policy_at_setup() {
        let gate = users_gate();
        assert!(gate.try_middleware(path("users.create")).is_ok());
        assert!(matches!(
            gate.try_middleware(path("users.delete")),
            Err(ConfigError::PolicyNotFound { .. })
        ));
    }

    #[test]
    fn try_middleware_catches_unknown_rules_at_setup() {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path("a"), RuleSet::new().with("id", "requird")));
        let gate = registry.freeze();

        assert!(matches!(
            gate.try_middleware(path("a")),
            Err(ConfigError::Rule(RuleError::UnknownRule { .. }))
        ));
        // Unchecked guards surface the same defect per request.
        assert!(gate.middleware(path("a")).check(&post(json!({}))).is_err());
    }

    #[test]
    fn users_create_scenario() {
        let guard = users_gate().middleware(path("users.create"));

        match guard.check(&post(json!({}))).unwrap() {
            Decision::Reject(rejection) => {
                assert_eq!(rejection.status(), 400);
                assert_eq!(rejection.message(), "Validation failed");
                assert!(rejection.errors().contains_key("id"));
            }
            Decision::Forward => panic!("empty body should be rejected"),
        }

        assert!(matches!(
            guard.check(&post(json!({ "id": "abc" }))).unwrap(),
            Decision::Reject(_)
        ));
        assert_eq!(guard.check(&post(json!({ "id": 7 }))).unwrap(), Decision::Forward);
    }

    #[test]
    fn handle_rejects_with_json_body() {
        let guard = users_gate().middleware(path("users.create"));
        let mut res = ResponseRecorder::new();
        let mut forwarded = false;

        guard
            .handle(&post(json!({})), &mut res, || forwarded = true)
            .unwrap();

        assert!(!forwarded);
        assert_eq!(res.status(), Some(400));
        assert_eq!(
            res.body().unwrap(),
            &json!({
                "status": 400,
                "message": "Validation failed",
                "errors": { "id": ["The id field is required."] }
            })
        );
    }

    #[test]
    fn handle_forwards_without_responding() {
        let guard = users_gate().middleware(path("users.create"));
        let mut res = ResponseRecorder::new();
        let mut forwarded = false;

        guard
            .handle(&post(json!({ "id": 5 })), &mut res, || forwarded = true)
            .unwrap();

        assert!(forwarded);
        assert!(!res.was_sent());
    }

    #[test]
    fn get_requests_validate_params_not_body() {
        let guard = users_gate().middleware(path("users.create"));

        let body_only = RequestAdapter::new(HttpMethod::Get).with_body(json!({ "id": 1 }));
        assert!(matches!(guard.check(&body_only).unwrap(), Decision::Reject(_)));

        let with_param = RequestAdapter::new(HttpMethod::Get).with_param("id", "12");
        assert_eq!(guard.check(&with_param).unwrap(), Decision::Forward);
    }

    #[test]
    fn put_and_patch_validate_body() {
        let guard = users_gate().middleware(path("users.create"));
        for method in [HttpMethod::Put, HttpMethod::Patch] {
            let req = RequestAdapter::new(method)
                .with_param("id", "1")
                .with_body(json!({}));
            assert!(matches!(guard.check(&req).unwrap(), Decision::Reject(_)), "{method}");
        }
    }

    #[test]
    fn enforce_maps_rejection_to_validation_error() {
        let guard = users_gate().middleware(path("users.create"));

        assert!(guard.enforce(&post(json!({ "id": 1 }))).is_ok());
        let err = guard.enforce(&post(json!({ "id": "x" }))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn config_shapes_rejections() {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path("items"), RuleSet::new().with("sku", "required")));
        let gate = registry.freeze_with(
            RuleEngine,
            GateConfig::default()
                .with_failure_status(422)
                .with_failure_message("Invalid request")
                .with_body_methods([HttpMethod::Delete]),
        );
        let guard = gate.middleware(path("items"));

        match guard.check(&RequestAdapter::new(HttpMethod::Delete)).unwrap() {
            Decision::Reject(rejection) => {
                assert_eq!(rejection.status(), 422);
                assert_eq!(rejection.message(), "Invalid request");
            }
            Decision::Forward => panic!("missing sku should be rejected"),
        }

        // POST is no longer a body method, so params are validated.
        let req = RequestAdapter::new(HttpMethod::Post)
            .with_body(json!({}))
            .with_param("sku", "A-1");
        assert_eq!(guard.check(&req).unwrap(), Decision::Forward);
    }

    struct AlwaysFails;

    impl Validate for AlwaysFails {
        fn validate(&self, _data: &Value, rules: &RuleSet) -> Result<ValidationOutcome, RuleError> {
            let mut outcome = ValidationOutcome::default();
            for (field, _) in rules.iter() {
                outcome.add(field, "rejected by policy");
            }
            Ok(outcome)
        }
    }

    #[test]
    fn custom_engines_plug_in() {
        let mut registry = PolicyRegistry::new();
        registry.register(create_policy(&path("a"), RuleSet::new().with("x", "whatever")));
        let gate = registry.freeze_with(AlwaysFails, GateConfig::default());

        assert!(gate.try_middleware(path("a")).is_ok());
        match gate.middleware(path("a")).check(&post(json!({ "x": 1 }))).unwrap() {
            Decision::Reject(rejection) => {
                assert_eq!(rejection.errors()["x"], vec!["rejected by policy".to_string()]);
            }
            Decision::Forward => panic!("engine always fails"),
        }
    }

    #[test]
    fn gate_and_guard_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync + Clone + 'static>() {}
        assert_send_sync::<Gate>();
        assert_send_sync::<Guard>();
    }
}
