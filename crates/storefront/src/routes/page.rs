//! Per-page context shared by every full-page template.
//!
//! Errors and confirmations travel as `?error=<code>` / `?success=<code>`
//! query parameters and are resolved to text here, in one place.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::cart::{CartStore, CartView, SessionCartStore};
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentUser;

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Resolved one-shot messages for a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flash {
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

impl From<&MessageQuery> for Flash {
    fn from(query: &MessageQuery) -> Self {
        Self {
            error: query.error.as_deref().and_then(error_message),
            success: query.success.as_deref().and_then(success_message),
        }
    }
}

/// Text for an error code. Unknown codes show nothing.
#[must_use]
pub fn error_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "outside_campus" => "Only campus domain emails are allowed.",
        "email_taken" => "Email already registered.",
        "invalid_email" => "Please enter a valid email address.",
        "password_too_short" => "Password must be at least 8 characters.",
        "credentials" => "Invalid email or password.",
        "login_required" => "Please log in first.",
        "photo_required" => "Please upload a photo.",
        "photo_type" => "Photos must be JPG, PNG, GIF or WebP images.",
        "photo_too_large" => "That photo is too large. Please choose a smaller one.",
        "invalid_price" => "Please enter a valid price up to $999999.99, e.g. 12.50.",
        "missing_fields" => "Please fill in every field.",
        "session" => "Your session could not be saved. Please try again.",
        "failed" => "Something went wrong. Please try again.",
        _ => return None,
    })
}

/// Text for a success code. Unknown codes show nothing.
#[must_use]
pub fn success_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "signed_up" => "Signup successful! Please log in.",
        "logged_in" => "Login successful!",
        "logged_out" => "You\u{2019}ve been logged out.",
        "listed" => "Item listed successfully!",
        "added_to_cart" => "Item added to cart. Proceed to buy.",
        "paid" => "Payment successful!",
        "paid_cart_changed" => {
            "Payment successful! Items added during checkout are still in your cart."
        }
        _ => return None,
    })
}

/// Everything the base layout needs: navigation state, cart icon, messages,
/// and the CSP nonce for script tags.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub cart: CartView,
    pub flash: Flash,
    pub nonce: String,
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;

        let query = Query::<MessageQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let cart = match parts.extensions.get::<Session>() {
            Some(session) => SessionCartStore::new(session.clone()).load().await,
            None => campus_cart_core::Cart::new(),
        };

        Ok(Self {
            user,
            cart: CartView::from(&cart),
            flash: Flash::from(&query),
            nonce,
        })
    }
}
