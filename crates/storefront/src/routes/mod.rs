//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Listings page
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database)
//!
//! # Cart (fragments refreshed by cart.js)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns #cart-icon fragment)
//! GET  /cart/count             - #cart-icon fragment
//! GET  /cart/items             - #cart-items + #total fragment
//! GET  /cart/summary           - #cart-summary fragment
//!
//! # Checkout
//! GET  /buy                    - Checkout page
//! GET  /buy-now/{id}           - Replace cart with one listing, go to /buy
//! POST /create-payment-intent  - JSON, returns { clientSecret }
//! POST /checkout/confirm       - Confirm card payment
//! POST /checkout/complete      - Finish after a card challenge
//!
//! # Selling (requires auth)
//! GET  /sell                   - Sell form
//! POST /sell                   - Create listing (multipart)
//!
//! # Auth
//! GET  /auth/signup            - Sign-up page
//! POST /auth/signup            - Sign-up action
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! POST /auth/logout            - Logout action
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod page;
pub mod sell;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::config::StorefrontConfig;
use crate::middleware::{ClientIpKeyExtractor, auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes(client_ip: ClientIpKeyExtractor) -> Router<AppState> {
    Router::new()
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter(client_ip))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/count", get(cart::count))
        .route("/items", get(cart::items))
        .route("/summary", get(cart::summary))
}

/// Create the payment routes router.
pub fn checkout_routes(client_ip: ClientIpKeyExtractor) -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(checkout::create_payment_intent))
        .route("/checkout/confirm", post(checkout::confirm))
        .route("/checkout/complete", post(checkout::complete))
        .layer(checkout_rate_limiter(client_ip))
}

/// Create the sell routes router.
///
/// The body limit covers the whole multipart request, photo included.
pub fn sell_routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .route("/sell", get(sell::sell_page).post(sell::sell))
        .layer(DefaultBodyLimit::max(config.uploads.max_bytes))
}

/// Create all routes for the storefront.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    let client_ip = ClientIpKeyExtractor::new(config.trusted_proxy_hops);

    Router::new()
        // Listings
        .route("/", get(home::home))
        // Cart routes
        .nest("/cart", cart_routes())
        // Checkout
        .route("/buy", get(cart::buy))
        .route("/buy-now/{id}", get(cart::buy_now))
        .merge(checkout_routes(client_ip))
        // Selling
        .merge(sell_routes(config))
        // Auth routes
        .nest("/auth", auth_routes(client_ip))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use crate::config::StorefrontConfig;
    use crate::middleware::session_layer;
    use crate::state::AppState;

    /// Router with an in-memory session store and a database pool that never
    /// connects. Only routes that do not touch the database are exercised.
    fn app() -> axum::Router {
        let config = StorefrontConfig::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/campus_cart_test")
            .unwrap();
        let sessions = session_layer(MemoryStore::default(), &config);
        let state = AppState::new(config, pool).unwrap();
        crate::app(state, sessions)
    }

    /// Socket peer as recorded by `into_make_service_with_connect_info`.
    fn peer(last_octet: u8) -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([203, 0, 113, last_octet], 50_000)))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_fresh_visitor_has_empty_cart_icon() {
        let response = app()
            .oneshot(Request::get("/cart/count").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("id=\"cart-icon\""), "{body}");
        assert!(body.contains("Cart (0)"), "{body}");
        assert!(!body.contains("bounce"), "{body}");
    }

    #[tokio::test]
    async fn test_empty_cart_items_fragment() {
        let response = app()
            .oneshot(Request::get("/cart/items").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_text(response).await;
        assert!(body.contains("id=\"total\""), "{body}");
        assert!(body.contains("0.00"), "{body}");
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_start_payment() {
        let request = Request::post("/create-payment-intent")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(peer(10))
            .body(Body::from(r#"{"amount":1500}"#))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"], "Cart is empty!");
    }

    #[tokio::test]
    async fn test_complete_rejects_malformed_intent_id() {
        let request = Request::post("/checkout/complete")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .extension(peer(11))
            .body(Body::from("payment_intent=..%2Fcharges"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sell_requires_login() {
        let response = app()
            .oneshot(Request::get("/sell").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/login?error=login_required"
        );
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let response = app()
            .oneshot(Request::get("/cart/count").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        let csp = headers
            .get(header::CONTENT_SECURITY_POLICY)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(csp.contains("https://js.stripe.com"));
        assert!(csp.contains("'nonce-"));
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_forwarded_for_does_not_bypass_auth_limit() {
        let app = app();
        let mut statuses = Vec::new();

        for attempt in 0..6u8 {
            let request = Request::get("/auth/login")
                .header("x-forwarded-for", format!("198.51.100.{attempt}"))
                .extension(peer(12))
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert!(statuses[..5].iter().all(|s| *s == StatusCode::OK), "{statuses:?}");
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }
}
