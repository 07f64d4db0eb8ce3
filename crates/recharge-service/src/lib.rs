//! Recharge back-office HTTP API.
//!
//! This crate exposes the recharge engine over HTTP:
//!
//! - Customer and app catalog management
//! - Code import (with duplicate reports) and inventory listing
//! - Order creation, updates, cancellation and completion
//!
//! # Authentication
//!
//! Every `/v1` route requires `Authorization: Bearer <JWT>` signed with the
//! shared HS256 secret. The token subject is the tenant id; all data access
//! is scoped to it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for axum even when they don't await

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AuthTenant, Claims};
pub use config::{ServiceConfig, StoreBackend};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
