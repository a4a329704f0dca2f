//! Mercato Core - Order domain types.
//!
//! This crate provides the types shared by every Mercato component:
//! - `storefront` - REST backend (customer checkout, webhooks, admin API)
//! - `cli` - Command-line tools for migrations and order operations
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Validation and the order status state machine live
//! here so every caller enforces the same invariants.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses
//! - [`order`] - The order document, line items, addresses and creation input
//! - [`validation`] - Field-level violations collected across a whole input

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod order;
pub mod types;
pub mod validation;

pub use order::*;
pub use types::*;
pub use validation::{ValidationErrors, Violation};
