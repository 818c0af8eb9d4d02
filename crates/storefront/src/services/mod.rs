//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Campus account sign-up and password login (Argon2id)
//! - `checkout` - Payment intent creation and confirmation for the cart
//! - `uploads` - Listing photo storage

pub mod auth;
pub mod checkout;
pub mod uploads;
