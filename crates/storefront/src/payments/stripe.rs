//! Stripe `PaymentIntents` REST client.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use campus_cart_core::Cents;

use super::{PaymentError, PaymentGateway, PaymentIntent, PaymentIntentId, PaymentIntentStatus};
use crate::config::StripeConfig;

/// Stripe API version pinned for every request.
const API_VERSION: &str = "2024-06-20";

/// Request timeout for Stripe calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client for payment intents.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    currency: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.secret_key.expose_secret()))
                .map_err(|e| PaymentError::Config(format!("Invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        headers.insert("Stripe-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.as_str().trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
        })
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.api_base)
    }

    fn intent_url(&self, id: &PaymentIntentId) -> String {
        format!("{}/v1/payment_intents/{id}", self.api_base)
    }

    /// Send a request and decode a payment intent or a Stripe error body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<PaymentIntent, PaymentError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let intent: StripePaymentIntent = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        intent.try_into()
    }
}

impl PaymentGateway for StripeClient {
    #[instrument(skip(self), fields(currency = %self.currency))]
    async fn create_payment_intent(&self, amount: Cents) -> Result<PaymentIntent, PaymentError> {
        let params = [
            ("amount", amount.as_u64().to_string()),
            ("currency", self.currency.clone()),
            ("payment_method_types[]", "card".to_string()),
        ];

        let intent = self
            .send(self.client.post(self.intents_url()).form(&params))
            .await?;

        tracing::info!(payment_intent = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self, client_secret))]
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let id = PaymentIntentId::from_client_secret(client_secret)?;
        let params = [("payment_method", payment_method)];

        let intent = self
            .send(
                self.client
                    .post(format!("{}/confirm", self.intent_url(&id)))
                    .form(&params),
            )
            .await?;

        tracing::info!(
            payment_intent = %intent.id,
            status = ?intent.status,
            "Payment intent confirmed"
        );
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(
        &self,
        id: &PaymentIntentId,
    ) -> Result<PaymentIntent, PaymentError> {
        self.send(self.client.get(self.intent_url(id))).await
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    status: PaymentIntentStatus,
    last_payment_error: Option<StripeApiError>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    message: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
}

impl TryFrom<StripePaymentIntent> for PaymentIntent {
    type Error = PaymentError;

    fn try_from(intent: StripePaymentIntent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PaymentIntentId::parse(&intent.id)
                .map_err(|_| PaymentError::Parse(format!("unexpected intent id {}", intent.id)))?,
            client_secret: intent.client_secret,
            amount: Cents::try_from(intent.amount)
                .map_err(|e| PaymentError::Parse(e.to_string()))?,
            status: intent.status,
            last_error: intent.last_payment_error.and_then(|e| e.message),
        })
    }
}

/// Build a `PaymentError::Api` from a non-2xx response body.
fn api_error(status: u16, body: &str) -> PaymentError {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(StripeErrorBody { error }) => PaymentError::Api {
            status,
            message: error
                .message
                .unwrap_or_else(|| "The payment provider rejected the request".to_string()),
            code: error.decline_code.or(error.code),
        },
        Err(_) => PaymentError::Api {
            status,
            message: format!("Payment provider returned HTTP {status}"),
            code: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_stripe_message_and_decline_code() {
        let body = r#"{
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "decline_code": "insufficient_funds",
                "message": "Your card has insufficient funds."
            }
        }"#;

        match api_error(402, body) {
            PaymentError::Api {
                status,
                message,
                code,
            } => {
                assert_eq!(status, 402);
                assert_eq!(message, "Your card has insufficient funds.");
                assert_eq!(code.as_deref(), Some("insufficient_funds"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_tolerates_non_json_body() {
        let err = api_error(503, "<html>upstream down</html>");
        assert_eq!(err.to_string(), "Payment provider returned HTTP 503");
        assert!(!err.is_card_error());
    }

    #[test]
    fn test_wire_intent_conversion() {
        let json = r#"{
            "id": "pi_3MtwBwLkdIwHu7ix28a3tqPa",
            "object": "payment_intent",
            "amount": 2300,
            "currency": "usd",
            "client_secret": "pi_3MtwBwLkdIwHu7ix28a3tqPa_secret_YrKJUKribcBjcG8HVhfZluoGH",
            "status": "requires_payment_method",
            "last_payment_error": null
        }"#;

        let wire: StripePaymentIntent = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        let intent = PaymentIntent::try_from(wire).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(intent.id.as_str(), "pi_3MtwBwLkdIwHu7ix28a3tqPa");
        assert_eq!(intent.amount, Cents::new(2300));
        assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert!(intent.last_error.is_none());
    }

    #[test]
    fn test_wire_intent_carries_last_payment_error() {
        let json = r#"{
            "id": "pi_1",
            "amount": 500,
            "client_secret": null,
            "status": "requires_payment_method",
            "last_payment_error": { "message": "Your card was declined.", "code": "card_declined" }
        }"#;

        let wire: StripePaymentIntent = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        let intent = PaymentIntent::try_from(wire).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(intent.last_error.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn test_client_trims_trailing_slash_from_base() {
        let mut config = crate::config::StorefrontConfig::for_tests().stripe;
        config.api_base = url::Url::parse("http://localhost:12111/").unwrap_or_else(|e| panic!("{e}"));

        let client = StripeClient::new(&config).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            client.intents_url(),
            "http://localhost:12111/v1/payment_intents"
        );
    }
}
