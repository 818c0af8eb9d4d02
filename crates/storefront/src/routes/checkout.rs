//! Checkout route handlers (JSON).
//!
//! Every failure is answered as `{ "error": "<message>" }` with a matching
//! status; the browser shows the message in an alert.

use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use campus_cart_core::Cents;

use crate::cart::{CartService, SessionCartStore};
use crate::error::{checkout_message, checkout_status, report};
use crate::payments::{PaymentError, PaymentIntentId};
use crate::services::checkout::{CheckoutError, CheckoutOutcome, CheckoutService};
use crate::state::AppState;

/// Body of `POST /create-payment-intent`.
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount the browser believes it is paying, in cents.
    pub amount: Option<u64>,
}

/// Successful response of `POST /create-payment-intent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: String,
}

/// Form of `POST /checkout/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmForm {
    pub client_secret: String,
    pub payment_method: String,
}

/// Form of `POST /checkout/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteForm {
    pub payment_intent: String,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn checkout_error(err: &CheckoutError) -> Response {
    if matches!(err, CheckoutError::Gateway(_) | CheckoutError::Cart(_)) {
        report(err);
    }
    json_error(checkout_status(err), &checkout_message(err))
}

/// JSON answer for a charge that went through or needs a card challenge.
fn outcome_response(outcome: CheckoutOutcome) -> Response {
    match outcome {
        CheckoutOutcome::Succeeded(_) => {
            Json(json!({ "status": "succeeded", "redirect": "/?success=paid" })).into_response()
        }
        CheckoutOutcome::CartChanged(_) => Json(json!({
            "status": "succeeded",
            "redirect": "/cart?success=paid_cart_changed",
        }))
        .into_response(),
        CheckoutOutcome::RequiresAction { client_secret } => Json(json!({
            "status": "requires_action",
            "clientSecret": client_secret,
        }))
        .into_response(),
    }
}

fn cart_service(session: Session) -> CartService<SessionCartStore> {
    CartService::new(SessionCartStore::new(session))
}

/// Create a payment intent for the session cart.
#[instrument(skip(state, session))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateIntentRequest>,
) -> Response {
    let cart = cart_service(session).current().await;
    let checkout = CheckoutService::new(state.payments());

    match checkout.begin(&cart, body.amount.map(Cents::new)).await {
        Ok(intent) => match intent.client_secret {
            Some(client_secret) => Json(CreateIntentResponse { client_secret }).into_response(),
            None => checkout_error(&CheckoutError::Gateway(PaymentError::Parse(
                "payment intent has no client secret".to_string(),
            ))),
        },
        Err(e) => checkout_error(&e),
    }
}

/// Confirm the payment with the card payment method created in the browser.
#[instrument(skip(state, session, form))]
pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ConfirmForm>,
) -> Response {
    let cart = cart_service(session);
    let checkout = CheckoutService::new(state.payments());

    match checkout
        .confirm(&cart, &form.client_secret, &form.payment_method)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => checkout_error(&e),
    }
}

/// Clear the cart after the browser finished a card challenge.
#[instrument(skip(state, session))]
pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CompleteForm>,
) -> Response {
    let Ok(intent_id) = PaymentIntentId::parse(&form.payment_intent) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid payment reference");
    };

    let cart = cart_service(session);
    let checkout = CheckoutService::new(state.payments());

    match checkout.complete(&cart, &intent_id).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => checkout_error(&e),
    }
}
