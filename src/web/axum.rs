//! # axum Integration
//!
//! Runs a [`Guard`] as axum middleware:
//!
//! ```no_run
//! use axum::middleware::from_fn_with_state;
//! use axum::routing::post;
//! use axum::{Json, Router};
//! use policy_gate::web::axum::validate;
//! use policy_gate::{create_policy, PolicyPath, PolicyRegistry, RuleSet};
//! use serde_json::Value;
//!
//! let path = PolicyPath::parse("users.create").unwrap();
//! let mut registry = PolicyRegistry::new();
//! registry.register(create_policy(&path, RuleSet::new().with("id", "required|integer")));
//! let gate = registry.freeze();
//!
//! let app: Router = Router::new().route(
//!     "/users",
//!     post(|Json(body): Json<Value>| async move { Json(body) })
//!         .route_layer(from_fn_with_state(gate.try_middleware(path).unwrap(), validate)),
//! );
//! ```
//!
//! The body is buffered (up to [`GateConfig::body_limit`](crate::GateConfig::body_limit)
//! bytes), parsed as JSON when the method is a body method, and put back
//! for the inner handler. Params are the query string merged with path
//! parameters, path parameters winning on conflict. Layer the middleware
//! per route (`route_layer`) so path parameters are available.

use ::axum::body::{to_bytes, Body};
use ::axum::extract::{FromRequestParts, Query, RawPathParams, Request, State};
use ::axum::http::StatusCode;
use ::axum::middleware::Next;
use ::axum::response::{IntoResponse, Response};
use ::axum::Json;
use serde_json::{json, Value};

use crate::error::ConfigError;
use crate::gate::{Decision, Guard};

use super::{HttpMethod, Rejection, RequestAdapter};

/// Middleware that validates the request against the guard's policy.
///
/// Use with [`from_fn_with_state`](::axum::middleware::from_fn_with_state),
/// passing the [`Guard`] as state.
pub async fn validate(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let method = HttpMethod::from_name(parts.method.as_str());
    let config = guard.config();

    let bytes = match to_bytes(body, config.body_limit()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::info!(policy = %guard.path(), error = %err, "request body could not be read");
            return body_rejection(&guard, "The body could not be read.");
        }
    };

    let mut adapter = RequestAdapter::new(method);
    if config.validates_body(method) && !bytes.is_empty() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => adapter.set_body(body),
            Err(err) => {
                tracing::info!(policy = %guard.path(), error = %err, "request body is not JSON");
                return body_rejection(&guard, "The body must be valid JSON.");
            }
        }
    }

    if let Ok(Query(query)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
        for (key, value) in query {
            adapter.add_param(key, value);
        }
    }
    if let Ok(path_params) = RawPathParams::from_request_parts(&mut parts, &()).await {
        for (key, value) in path_params.iter() {
            adapter.add_param(key, value);
        }
    }

    match guard.check(&adapter) {
        Ok(Decision::Forward) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
        Ok(Decision::Reject(rejection)) => rejection.into_response(),
        Err(err) => config_failure(&err),
    }
}

fn body_rejection(guard: &Guard, message: &str) -> Response {
    let config = guard.config();
    let errors = [("body".to_string(), vec![message.to_string()])]
        .into_iter()
        .collect();
    Rejection::new(config.failure_status(), config.failure_message(), errors).into_response()
}

fn config_failure(err: &ConfigError) -> Response {
    let body = json!({
        "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        "message": err.to_string(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
