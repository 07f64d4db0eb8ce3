//! Core types and utilities for the recharge back-office.
//!
//! This crate provides the foundational types shared by the store, the
//! fulfillment engine and the HTTP service:
//!
//! - **Identifiers**: `TenantId`, `CustomerId`, `AppId`, `CodeId`, `OrderId`
//! - **Catalog & customers**: `App`, `Customer`
//! - **Inventory**: `RechargeCode`, `DuplicateCode`, `CodeFilter`
//! - **Orders**: `Order`, `OrderItem`, `OrderStatus`, `PaymentStatus`
//! - **Updates**: `Patch`, `CustomerUpdate`, `AppUpdate`, `OrderUpdate`
//! - **Messages**: order confirmation and code delivery texts
//!
//! # Tenancy
//!
//! Every entity carries the `TenantId` of the reseller that owns it. Nothing is
//! visible across tenants.
//!
//! # Money
//!
//! Prices and totals are integer cents (`i64`) to avoid floating point
//! rounding. `2500` is R$ 25.00.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod code;
pub mod customer;
pub mod error;
pub mod ids;
pub mod message;
pub mod order;
pub mod patch;

pub use catalog::{app_display_name, App, NewApp, MAX_PRICE_CENTS, UNKNOWN_APP_NAME};
pub use code::{
    normalize_codes, split_code_text, CodeFilter, CodeStatus, DuplicateCode, RechargeCode,
};
pub use customer::{Customer, NewCustomer};
pub use error::{RechargeError, Result};
pub use ids::{AppId, CodeId, CustomerId, IdError, OrderId, OrderItemId, TenantId};
pub use order::{NewOrderItem, Order, OrderItem, OrderStatus, PaymentStatus};
pub use patch::{AppUpdate, CustomerUpdate, OrderUpdate, Patch};
