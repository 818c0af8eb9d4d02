//! Hosted-payment provider integration.
//!
//! # Architecture
//!
//! - The browser mounts the provider's card element and turns the card into a
//!   payment method id; card numbers never touch this server
//! - The server creates and confirms payment intents with the secret key
//! - Everything provider-specific sits behind [`PaymentGateway`] so checkout
//!   logic can be exercised against a fake
//!
//! # Flow
//!
//! ```text
//! browser                         storefront                      Stripe
//!   | POST /create-payment-intent    |                               |
//!   |------------------------------->| create_payment_intent(amount) |
//!   |                                |------------------------------>|
//!   |        { clientSecret }        |<------------------------------|
//!   |<-------------------------------|                               |
//!   | POST /checkout/confirm         |                               |
//!   |------------------------------->| confirm_card_payment(...)     |
//!   |                                |------------------------------>|
//!   |   { status } | { error }       |<------------------------------|
//!   |<-------------------------------|                               |
//! ```

mod stripe;

pub use stripe::StripeClient;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use campus_cart_core::Cents;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request (declined card, bad parameters, ...).
    #[error("{message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Human-readable message from the provider.
        message: String,
        /// Machine-readable error code, when given.
        code: Option<String>,
    },

    /// A client secret did not have the `pi_<id>_secret_<secret>` shape.
    #[error("invalid payment intent client secret")]
    InvalidClientSecret,

    /// Response body could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Whether this error was caused by the customer's card or input rather
    /// than by the provider or the network.
    #[must_use]
    pub const fn is_card_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == 402)
    }
}

/// Identifier of a payment intent, e.g. `pi_3MtwBwLkdIwHu7ix28a3tqPa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentIntentId(String);

impl PaymentIntentId {
    /// Parse a payment intent id.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidClientSecret` unless the id has the
    /// `pi_` prefix and only URL-safe characters.
    pub fn parse(id: &str) -> Result<Self, PaymentError> {
        let id = id.trim();
        let valid = id.len() > 3
            && id.starts_with("pi_")
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if valid {
            Ok(Self(id.to_owned()))
        } else {
            Err(PaymentError::InvalidClientSecret)
        }
    }

    /// Extract the intent id from a client secret.
    ///
    /// A client secret has the form `pi_<id>_secret_<secret>`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidClientSecret` if the secret is malformed.
    pub fn from_client_secret(client_secret: &str) -> Result<Self, PaymentError> {
        let (id, secret) = client_secret
            .trim()
            .split_once("_secret_")
            .ok_or(PaymentError::InvalidClientSecret)?;
        if secret.is_empty() {
            return Err(PaymentError::InvalidClientSecret);
        }
        Self::parse(id)
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    /// Whether the customer has been charged.
    #[must_use]
    pub const fn is_succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// A server-issued token representing a pending charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Intent identifier.
    pub id: PaymentIntentId,
    /// Secret handed to the browser SDK; absent on some provider responses.
    pub client_secret: Option<String>,
    /// Amount in cents.
    pub amount: Cents,
    /// Current state.
    pub status: PaymentIntentStatus,
    /// Message from the most recent failed attempt, if any.
    pub last_error: Option<String>,
}

/// The payment provider as seen by checkout.
///
/// Implementations must be cheap to share across requests.
pub trait PaymentGateway: Send + Sync {
    /// Create an intent to charge `amount` in the configured currency.
    fn create_payment_intent(
        &self,
        amount: Cents,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;

    /// Confirm the intent behind `client_secret` with a card payment method.
    fn confirm_card_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;

    /// Fetch the current state of an intent.
    fn retrieve_payment_intent(
        &self,
        id: &PaymentIntentId,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;
}
