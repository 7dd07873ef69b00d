//! Policy registration and request gating for a small users API.
//!
//! This example shows:
//! 1. Building policies in code and declaring them as JSON
//! 2. Freezing the registry and wiring one guard per route
//! 3. Rejected, forwarded and misconfigured requests
//!
//! Run with: `cargo run --example users_api`

use policy_gate::web::{RequestAdapter, ResponseRecorder};
use policy_gate::{
    create_policy, Guard, HttpMethod, PolicyFragment, PolicyPath, PolicyRegistry, RuleSet,
};
use serde_json::json;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Users API Gate Example ===\n");

    let create = PolicyPath::parse("users.create").expect("valid path");
    let mut registry = PolicyRegistry::new();
    registry.register(create_policy(
        &create,
        RuleSet::new()
            .with("email", "required|email")
            .with("age", "integer|min:18"),
    ));

    let declared: PolicyFragment = r#"{
        "users": {
            "show": { "rules": { "id": "required|integer" } }
        }
    }"#
    .parse()
    .expect("valid fragment");
    registry.register(declared);

    println!("Registered policies: {:?}\n", registry.paths());
    let gate = registry.freeze();

    let create_guard = gate.try_middleware(create).expect("users.create registered");
    let show_guard = gate
        .try_middleware(PolicyPath::parse("users.show").expect("valid path"))
        .expect("users.show registered");

    println!("--- Scenario 1: POST /users with invalid body ---");
    let req = RequestAdapter::new(HttpMethod::Post).with_body(json!({ "email": "nope", "age": 12 }));
    dispatch(&create_guard, &req);

    println!("\n--- Scenario 2: POST /users with valid body ---");
    let req = RequestAdapter::new(HttpMethod::Post).with_body(json!({ "email": "ada@example.com", "age": 36 }));
    dispatch(&create_guard, &req);

    println!("\n--- Scenario 3: GET /users/:id ---");
    let req = RequestAdapter::new(HttpMethod::Get).with_param("id", "42");
    dispatch(&show_guard, &req);

    println!("\n--- Scenario 4: route wired to a missing policy ---");
    match gate.try_middleware(PolicyPath::parse("users.delete").expect("valid path")) {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Wiring error (expected): {}", e),
    }

    println!("\n=== Example Complete ===");
}

fn dispatch(guard: &Guard, req: &RequestAdapter) {
    let mut res = ResponseRecorder::new();
    let result = guard.handle(req, &mut res, || println!("-> next handler runs"));

    match (result, res.body()) {
        (Ok(()), Some(body)) => println!("<- {} {}", res.status().unwrap_or_default(), body),
        (Ok(()), None) => println!("<- handled downstream"),
        (Err(e), _) => println!("Configuration error: {}", e),
    }
}
