//! Domain models for the storefront.
//!
//! Row types live next to their repositories in `db`; these are the validated
//! shapes handlers and templates work with.

pub mod listing;
pub mod session;
pub mod user;

pub use listing::{Listing, NewListing};
pub use session::CurrentUser;
pub use user::User;
