//! Web framework integration surface.
//!
//! This module is the boundary between HTTP frameworks and the gate. It
//! handles:
//! - Mapping HTTP requests to gate input ([`GateInput`], [`RequestAdapter`])
//! - The rejection response and how it is sent ([`Rejection`], [`Respond`])
//!
//! # Design Principles
//!
//! 1. **Framework-agnostic core**: everything except the `axum` submodule is
//!    free of framework types. Integrations implement [`GateInput`] and
//!    [`Respond`] or use [`RequestAdapter`] and [`ResponseRecorder`].
//!
//! 2. **No policy decisions here**: this module moves data in and out. The
//!    [`Guard`](crate::Guard) decides.
//!
//! 3. **Explicit context**: no global registry. Every guard carries the
//!    frozen [`Gate`](crate::Gate) it came from.
//!
//! # Integration Model
//!
//! ```text
//! HTTP Request
//!   ↓
//! Framework code builds a RequestAdapter (method, JSON body, params)
//!   ↓
//! Guard::check / Guard::handle
//!   ↓
//! Forward → next handler      Reject → 400 JSON via Respond
//! ```

mod adapter;
#[cfg(feature = "axum")]
pub mod axum;
mod extract;
mod method;
mod response;

pub use adapter::RequestAdapter;
pub use extract::GateInput;
pub use method::HttpMethod;
pub use response::{Rejection, Respond, ResponseRecorder};
