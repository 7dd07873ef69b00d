//! Path-keyed validation policies and a validating request gate.
//!
//! This crate lets an HTTP service declare, per route, the rules incoming
//! request data must satisfy, and rejects requests that break them before
//! they reach a handler:
//! - **Policies**: rule sets stored in a tree addressed by dotted paths
//!   (`users.create`)
//! - **Registry**: an explicitly owned, setup-time collection of policies,
//!   frozen into a read-only gate before serving
//! - **Guards**: per-route middleware that validates the body (POST, PUT,
//!   PATCH) or params (everything else) and answers 400 on failure
//!
//! # Core Types
//!
//! - [`PolicyPath`]: Validated dotted identifier of a policy
//! - [`RuleSet`]: Field name to rule expression (`"required|integer"`)
//! - [`PolicyFragment`]: Partial policy tree built by [`create_policy`]
//! - [`PolicyRegistry`]: Deep-merging registry, frozen into a [`Gate`]
//! - [`Guard`]: The validating middleware for one route
//! - [`Validate`]: Pluggable rule engine; [`RuleEngine`] is the default
//!
//! # Examples
//!
//! ```
//! use policy_gate::web::{RequestAdapter, ResponseRecorder};
//! use policy_gate::{create_policy, HttpMethod, PolicyPath, PolicyRegistry, RuleSet};
//! use serde_json::json;
//!
//! // Startup: build and register policies, then freeze.
//! let create = PolicyPath::parse("users.create").unwrap();
//! let mut registry = PolicyRegistry::new();
//! registry.register(create_policy(&create, RuleSet::new().with("id", "required|integer")));
//! let gate = registry.freeze();
//!
//! // Routing: one guard per route.
//! let guard = gate.try_middleware(create).expect("policy registered");
//!
//! // Serving: invalid data is answered with 400 and never forwarded.
//! let mut res = ResponseRecorder::new();
//! let req = RequestAdapter::new(HttpMethod::Post).with_body(json!({ "id": "abc" }));
//! guard.handle(&req, &mut res, || unreachable!()).unwrap();
//! assert_eq!(res.status(), Some(400));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod gate;
mod path;
mod policy;
mod registry;
mod rules;
pub mod web;

#[cfg(test)]
mod test_utils;

pub use config::{GateConfig, DEFAULT_BODY_LIMIT};
pub use engine::{RuleEngine, Validate, ValidationOutcome};
pub use error::{ConfigError, GateError, RuleError};
pub use gate::{Decision, Gate, Guard};
pub use path::PolicyPath;
pub use policy::{create_policy, Policy, PolicyFragment};
pub use registry::PolicyRegistry;
pub use rules::{RuleExpr, RuleSet};
pub use web::HttpMethod;
