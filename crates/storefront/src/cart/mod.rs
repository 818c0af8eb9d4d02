//! Visitor cart: persistence and presentation.
//!
//! - [`store`] loads and saves the [`campus_cart_core::Cart`] under the single
//!   session key `cart`, and offers the append / buy-now / clear mutations
//! - [`view`] turns a cart into the strings the page fragments display

pub mod store;
pub mod view;

pub use store::{CartService, CartStore, CartStoreError, MemoryCartStore, SessionCartStore};
pub use view::{CartLineView, CartView};
