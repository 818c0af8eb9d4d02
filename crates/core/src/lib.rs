//! Campus Cart Core - Shared types library.
//!
//! This crate provides common types used across all Campus Cart components:
//! - `storefront` - Marketplace site with the cart widget and checkout
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart mutation, totals and price formatting live
//! here so they can be tested without a browser, a session store or a
//! payment provider.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, prices and the cart itself

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
