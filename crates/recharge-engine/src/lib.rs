//! Business services for the recharge back-office.
//!
//! The [`Engine`] is the single entry point for state changes:
//!
//! - **Ingestion**: bulk import of codes, rejected as a whole when any value
//!   already exists in the tenant's inventory ([`Engine::ingest`])
//! - **Fulfillment**: all-or-nothing allocation of unused codes to a pending
//!   order ([`Engine::complete_order`])
//! - **Orders**: creation with price snapshots, updates, cancellation, deletion
//! - **Catalog & customers**: CRUD with tenant scoping
//!
//! # Concurrency
//!
//! Every mutating operation runs under the tenant's lock from [`TenantLocks`],
//! so two completions for one tenant never read the same unused codes. The
//! store's own re-check in `fulfill_order` backs this up across processes.
//!
//! # Notifications
//!
//! Order confirmations and code deliveries go through a [`Notifier`]. A failed
//! delivery is logged and never turns a successful operation into an error.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod catalog;
mod engine;
mod fulfillment;
mod ingest;
pub mod locks;
pub mod notify;
mod orders;

pub use engine::{Engine, EngineConfig, DEFAULT_MAX_CODES_PER_IMPORT};
pub use fulfillment::Fulfillment;
pub use ingest::IngestReport;
pub use locks::TenantLocks;
pub use notify::{
    LogNotifier, Notifier, NotifyError, NotifyOutcome, WhatsAppClient, WhatsAppConfig,
};
