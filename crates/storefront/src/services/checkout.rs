//! Checkout: turn the visitor's cart into a confirmed card payment.
//!
//! The server is authoritative for the amount. A checkout is two sequential
//! gateway calls (create, then confirm) with no retry; the cart is emptied
//! only once the provider reports the intent as succeeded for exactly the
//! cart total.

use thiserror::Error;

use campus_cart_core::{Cart, Cents};

use crate::cart::{CartService, CartStore, CartStoreError};
use crate::error::add_breadcrumb;
use crate::payments::{
    PaymentError, PaymentGateway, PaymentIntent, PaymentIntentId, PaymentIntentStatus,
};

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to pay for.
    #[error("Cart is empty!")]
    EmptyCart,

    /// The amount to charge is not the cart total.
    #[error("amount {requested} does not match cart total {expected}")]
    AmountMismatch { requested: Cents, expected: Cents },

    /// The provider declined or the confirmation did not succeed.
    #[error("{0}")]
    PaymentFailed(String),

    /// The provider could not be reached or answered unexpectedly.
    #[error("payment provider error: {0}")]
    Gateway(#[from] PaymentError),

    /// The emptied cart could not be saved.
    #[error("cart error: {0}")]
    Cart(#[from] CartStoreError),
}

impl CheckoutError {
    /// Provider rejections of the request itself (4xx) are the customer's
    /// problem to fix; anything else is a gateway failure.
    fn from_provider(err: PaymentError) -> Self {
        let rejected = matches!(
            &err,
            PaymentError::Api { status, .. } if (400..500).contains(status)
        ) || matches!(err, PaymentError::InvalidClientSecret);

        if rejected {
            tracing::info!(error = %err, "Payment rejected by provider");
            Self::PaymentFailed(err.to_string())
        } else {
            Self::Gateway(err)
        }
    }
}

/// Result of a charge that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Charged; the cart has been cleared.
    Succeeded(PaymentIntent),
    /// Charged, but the cart changed while the payment was in flight. The
    /// cart is kept so nothing unpaid is lost.
    CartChanged(PaymentIntent),
    /// The card needs a customer challenge (3-D Secure) in the browser.
    RequiresAction { client_secret: String },
}

/// Checkout operations over a payment gateway.
pub struct CheckoutService<'a, G> {
    gateway: &'a G,
}

impl<'a, G: PaymentGateway> CheckoutService<'a, G> {
    /// Create a checkout service.
    #[must_use]
    pub const fn new(gateway: &'a G) -> Self {
        Self { gateway }
    }

    /// Create a payment intent for the cart total.
    ///
    /// An empty cart is rejected before the provider is contacted.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the total is zero,
    /// `CheckoutError::AmountMismatch` if `requested` differs from the total,
    /// `CheckoutError::PaymentFailed` if the provider refuses the amount, and
    /// `CheckoutError::Gateway` if the provider call fails.
    pub async fn begin(
        &self,
        cart: &Cart,
        requested: Option<Cents>,
    ) -> Result<PaymentIntent, CheckoutError> {
        let total = cart.total();
        if total.is_zero() {
            return Err(CheckoutError::EmptyCart);
        }

        if let Some(requested) = requested
            && requested != total
        {
            tracing::warn!(%requested, expected = %total, "Checkout amount mismatch");
            return Err(CheckoutError::AmountMismatch {
                requested,
                expected: total,
            });
        }

        add_breadcrumb(
            "checkout",
            "Creating payment intent",
            Some(&[("amount", total.decimal().as_str())]),
        );

        self.gateway
            .create_payment_intent(total)
            .await
            .map_err(CheckoutError::from_provider)
    }

    /// Confirm the intent with a card payment method and clear the cart on
    /// success.
    ///
    /// The intent is checked against the current cart total first, so a cart
    /// that changed after `begin` is never charged at the stale amount.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::AmountMismatch` if the intent amount is no
    /// longer the cart total, and `CheckoutError::PaymentFailed` when the
    /// provider rejects the payment or leaves it in any state other than
    /// succeeded or requires-action; the cart is left untouched in both cases.
    pub async fn confirm<S: CartStore>(
        &self,
        cart: &CartService<S>,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let intent_id = PaymentIntentId::from_client_secret(client_secret)
            .map_err(CheckoutError::from_provider)?;
        let pending = self
            .gateway
            .retrieve_payment_intent(&intent_id)
            .await
            .map_err(CheckoutError::from_provider)?;
        let total = cart.current().await.total();
        if pending.amount != total {
            tracing::warn!(
                payment_intent = %pending.id,
                requested = %pending.amount,
                expected = %total,
                "Cart changed after payment intent was created"
            );
            return Err(CheckoutError::AmountMismatch {
                requested: pending.amount,
                expected: total,
            });
        }

        let intent = self
            .gateway
            .confirm_card_payment(client_secret, payment_method)
            .await
            .map_err(|e| match e {
                e @ PaymentError::Api { .. } => {
                    tracing::info!(error = %e, "Card payment rejected");
                    CheckoutError::PaymentFailed(e.to_string())
                }
                other => CheckoutError::from_provider(other),
            })?;

        match intent.status {
            PaymentIntentStatus::Succeeded => settle(cart, intent).await,
            PaymentIntentStatus::RequiresAction => Ok(CheckoutOutcome::RequiresAction {
                client_secret: intent
                    .client_secret
                    .unwrap_or_else(|| client_secret.to_string()),
            }),
            status => Err(CheckoutError::PaymentFailed(intent.last_error.unwrap_or_else(
                || format!("Payment was not completed (status: {status:?})"),
            ))),
        }
    }

    /// Settle an intent confirmed in the browser after a card challenge.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::PaymentFailed` if the intent has not
    /// succeeded, and `CheckoutError::Gateway` if it cannot be retrieved.
    pub async fn complete<S: CartStore>(
        &self,
        cart: &CartService<S>,
        intent_id: &PaymentIntentId,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let intent = self
            .gateway
            .retrieve_payment_intent(intent_id)
            .await
            .map_err(CheckoutError::from_provider)?;
        if !intent.status.is_succeeded() {
            tracing::info!(payment_intent = %intent.id, status = ?intent.status, "Intent not yet succeeded");
            return Err(CheckoutError::PaymentFailed(
                "Payment was not completed. Please try again.".to_string(),
            ));
        }

        settle(cart, intent).await
    }
}

/// Clear the cart when the charged amount is exactly its total.
async fn settle<S: CartStore>(
    cart: &CartService<S>,
    intent: PaymentIntent,
) -> Result<CheckoutOutcome, CheckoutError> {
    let total = cart.current().await.total();
    if intent.amount != total {
        tracing::warn!(
            payment_intent = %intent.id,
            charged = %intent.amount,
            cart_total = %total,
            "Payment succeeded but cart changed; keeping cart"
        );
        add_breadcrumb("checkout", "Payment succeeded for a changed cart", None);
        return Ok(CheckoutOutcome::CartChanged(intent));
    }

    cart.clear().await?;
    tracing::info!(payment_intent = %intent.id, amount = %intent.amount, "Payment succeeded");
    add_breadcrumb("checkout", "Payment succeeded", None);
    Ok(CheckoutOutcome::Succeeded(intent))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use campus_cart_core::CartItem;

    use super::*;
    use crate::cart::{CartView, MemoryCartStore};

    const SECRET: &str = "pi_test123_secret_abc";

    /// Scripted gateway that counts calls.
    ///
    /// Intents are created for whatever amount is asked, retrieved at
    /// `intent_amount` and confirmed at `charged_amount`.
    struct FakeGateway {
        create_calls: AtomicUsize,
        confirm_calls: AtomicUsize,
        create_error: Mutex<Option<PaymentError>>,
        confirm_result: Mutex<Option<Result<PaymentIntentStatus, PaymentError>>>,
        retrieve_status: PaymentIntentStatus,
        intent_amount: Cents,
        charged_amount: Cents,
    }

    impl FakeGateway {
        fn confirming(status: PaymentIntentStatus) -> Self {
            Self {
                create_calls: AtomicUsize::new(0),
                confirm_calls: AtomicUsize::new(0),
                create_error: Mutex::new(None),
                confirm_result: Mutex::new(Some(Ok(status))),
                retrieve_status: status,
                intent_amount: Cents::new(2300),
                charged_amount: Cents::new(2300),
            }
        }

        fn declining(message: &str) -> Self {
            let gateway = Self::confirming(PaymentIntentStatus::RequiresPaymentMethod);
            *gateway.confirm_result.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(Err(PaymentError::Api {
                    status: 402,
                    message: message.to_string(),
                    code: Some("card_declined".to_string()),
                }));
            gateway
        }

        fn failing_create(error: PaymentError) -> Self {
            let gateway = Self::confirming(PaymentIntentStatus::Succeeded);
            *gateway.create_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
            gateway
        }

        fn with_amounts(mut self, intent: u64, charged: u64) -> Self {
            self.intent_amount = Cents::new(intent);
            self.charged_amount = Cents::new(charged);
            self
        }

        fn intent(amount: Cents, status: PaymentIntentStatus) -> PaymentIntent {
            PaymentIntent {
                id: PaymentIntentId::parse("pi_test123").unwrap_or_else(|e| panic!("{e}")),
                client_secret: Some(SECRET.to_string()),
                amount,
                status,
                last_error: None,
            }
        }
    }

    impl PaymentGateway for FakeGateway {
        async fn create_payment_intent(
            &self,
            amount: Cents,
        ) -> Result<PaymentIntent, PaymentError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self
                .create_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
            {
                return Err(err);
            }
            Ok(Self::intent(amount, PaymentIntentStatus::RequiresPaymentMethod))
        }

        async fn confirm_card_payment(
            &self,
            _client_secret: &str,
            _payment_method: &str,
        ) -> Result<PaymentIntent, PaymentError> {
            self.confirm_calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .confirm_result
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
                .unwrap_or(Ok(PaymentIntentStatus::Succeeded));
            result.map(|status| Self::intent(self.charged_amount, status))
        }

        async fn retrieve_payment_intent(
            &self,
            _id: &PaymentIntentId,
        ) -> Result<PaymentIntent, PaymentError> {
            Ok(Self::intent(self.intent_amount, self.retrieve_status))
        }
    }

    async fn filled_cart() -> (MemoryCartStore, CartService<MemoryCartStore>) {
        let store = MemoryCartStore::new();
        let cart = CartService::new(store.clone());
        let _ = cart.add(CartItem::new("1", "Calculator", Cents::new(1500))).await;
        let _ = cart.add(CartItem::new("2", "Lab coat", Cents::new(800))).await;
        (store, cart)
    }

    #[tokio::test]
    async fn test_empty_cart_rejected_before_network() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::Succeeded);
        let checkout = CheckoutService::new(&gateway);

        let result = checkout.begin(&Cart::new(), None).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(
            result.map(|_| ()).err().map(|e| e.to_string()).as_deref(),
            Some("Cart is empty!")
        );
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_begin_uses_cart_total() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::Succeeded);
        let checkout = CheckoutService::new(&gateway);
        let (_, cart) = filled_cart().await;

        let intent = checkout
            .begin(&cart.current().await, Some(Cents::new(2300)))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(intent.amount, Cents::new(2300));
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_begin_rejects_tampered_amount() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::Succeeded);
        let checkout = CheckoutService::new(&gateway);
        let (_, cart) = filled_cart().await;

        let result = checkout
            .begin(&cart.current().await, Some(Cents::new(1)))
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::AmountMismatch { requested, expected })
                if requested == Cents::new(1) && expected == Cents::new(2300)
        ));
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_begin_provider_rejection_is_a_payment_failure() {
        let gateway = FakeGateway::failing_create(PaymentError::Api {
            status: 400,
            message: "Amount must be no more than $999,999.99".to_string(),
            code: Some("amount_too_large".to_string()),
        });
        let (_, cart) = filled_cart().await;

        let result = CheckoutService::new(&gateway)
            .begin(&cart.current().await, None)
            .await;
        match result {
            Err(CheckoutError::PaymentFailed(message)) => {
                assert_eq!(message, "Amount must be no more than $999,999.99");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_begin_provider_outage_is_a_gateway_error() {
        let gateway = FakeGateway::failing_create(PaymentError::Api {
            status: 503,
            message: "Service unavailable".to_string(),
            code: None,
        });
        let (_, cart) = filled_cart().await;

        let result = CheckoutService::new(&gateway)
            .begin(&cart.current().await, None)
            .await;
        assert!(matches!(result, Err(CheckoutError::Gateway(_))));
    }

    #[tokio::test]
    async fn test_successful_payment_clears_cart() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::Succeeded);
        let checkout = CheckoutService::new(&gateway);
        let (store, cart) = filled_cart().await;

        let outcome = checkout
            .confirm(&cart, SECRET, "pm_card_visa")
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert!(matches!(outcome, CheckoutOutcome::Succeeded(_)));
        assert_eq!(store.raw().as_deref(), Some("[]"));
        let view = CartView::from(&cart.current().await);
        assert_eq!(view.icon_label, "Cart (0)");
        assert!(view.lines.is_empty());
    }

    #[tokio::test]
    async fn test_item_added_after_begin_is_not_charged_or_lost() {
        let gateway =
            FakeGateway::confirming(PaymentIntentStatus::Succeeded).with_amounts(1500, 1500);
        let checkout = CheckoutService::new(&gateway);
        let store = MemoryCartStore::new();
        let cart = CartService::new(store.clone());
        let _ = cart.add(CartItem::new("1", "Calculator", Cents::new(1500))).await;

        checkout
            .begin(&cart.current().await, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let _ = cart.add(CartItem::new("2", "Lab coat", Cents::new(800))).await;

        let result = checkout.confirm(&cart, SECRET, "pm_card_visa").await;
        assert!(matches!(
            result,
            Err(CheckoutError::AmountMismatch { requested, expected })
                if requested == Cents::new(1500) && expected == Cents::new(2300)
        ));
        assert_eq!(gateway.confirm_calls.load(Ordering::SeqCst), 0);
        assert_eq!(cart.current().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cart_changed_during_confirmation_is_kept() {
        // Checked at the cart total, but charged for less by the time the
        // confirmation came back.
        let gateway =
            FakeGateway::confirming(PaymentIntentStatus::Succeeded).with_amounts(2300, 1500);
        let checkout = CheckoutService::new(&gateway);
        let (store, cart) = filled_cart().await;
        let before = store.raw();

        let outcome = checkout
            .confirm(&cart, SECRET, "pm_card_visa")
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert!(matches!(
            outcome,
            CheckoutOutcome::CartChanged(ref intent) if intent.amount == Cents::new(1500)
        ));
        assert_eq!(store.raw(), before);
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_cart_unchanged() {
        let gateway = FakeGateway::declining("Your card was declined.");
        let checkout = CheckoutService::new(&gateway);
        let (store, cart) = filled_cart().await;
        let before = store.raw();

        let result = checkout
            .confirm(&cart, SECRET, "pm_card_chargeDeclined")
            .await;

        match result {
            Err(CheckoutError::PaymentFailed(message)) => {
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.raw(), before);
        assert_eq!(cart.current().await.len(), 2);
        assert_eq!(gateway.confirm_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_client_secret_is_rejected() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::Succeeded);
        let (_, cart) = filled_cart().await;

        let result = CheckoutService::new(&gateway)
            .confirm(&cart, "not-a-secret", "pm_card_visa")
            .await;
        assert!(matches!(result, Err(CheckoutError::PaymentFailed(_))));
        assert_eq!(gateway.confirm_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsettled_status_is_a_failure() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::RequiresPaymentMethod);
        let checkout = CheckoutService::new(&gateway);
        let (_, cart) = filled_cart().await;

        let result = checkout.confirm(&cart, SECRET, "pm_card_visa").await;
        assert!(matches!(result, Err(CheckoutError::PaymentFailed(_))));
        assert_eq!(cart.current().await.len(), 2);
    }

    #[tokio::test]
    async fn test_requires_action_keeps_cart() {
        let gateway = FakeGateway::confirming(PaymentIntentStatus::RequiresAction);
        let checkout = CheckoutService::new(&gateway);
        let (_, cart) = filled_cart().await;

        let outcome = checkout
            .confirm(&cart, SECRET, "pm_card_threeDSecure2Required")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            outcome,
            CheckoutOutcome::RequiresAction {
                client_secret: SECRET.to_string()
            }
        );
        assert_eq!(cart.current().await.len(), 2);
    }

    #[tokio::test]
    async fn test_complete_clears_only_succeeded_intents() {
        let id = PaymentIntentId::parse("pi_test123").unwrap_or_else(|e| panic!("{e}"));

        let pending = FakeGateway::confirming(PaymentIntentStatus::Processing);
        let (_, cart) = filled_cart().await;
        let result = CheckoutService::new(&pending).complete(&cart, &id).await;
        assert!(matches!(result, Err(CheckoutError::PaymentFailed(_))));
        assert_eq!(cart.current().await.len(), 2);

        let done = FakeGateway::confirming(PaymentIntentStatus::Succeeded);
        let outcome = CheckoutService::new(&done)
            .complete(&cart, &id)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(outcome, CheckoutOutcome::Succeeded(_)));
        assert!(cart.current().await.is_empty());
    }

    #[tokio::test]
    async fn test_complete_keeps_cart_that_changed_during_challenge() {
        let id = PaymentIntentId::parse("pi_test123").unwrap_or_else(|e| panic!("{e}"));
        let gateway =
            FakeGateway::confirming(PaymentIntentStatus::Succeeded).with_amounts(1500, 1500);
        let (_, cart) = filled_cart().await;

        let outcome = CheckoutService::new(&gateway)
            .complete(&cart, &id)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(outcome, CheckoutOutcome::CartChanged(_)));
        assert_eq!(cart.current().await.len(), 2);
    }
}
