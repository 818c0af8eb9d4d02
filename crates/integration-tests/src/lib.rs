//! Integration tests for Campus Cart.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database, migrate, and run the storefront
//! cargo run -p campus-cart-cli -- migrate
//! STOREFRONT_TRUSTED_PROXY_HOPS=1 cargo run -p campus-cart-storefront
//!
//! # Run integration tests against it
//! cargo test -p campus-cart-integration-tests -- --ignored
//! ```
//!
//! The tests act as the storefront's one trusted proxy: every client sends
//! its own `x-forwarded-for` address, so per-IP rate limits apply per test
//! client rather than to the whole suite.
//!
//! Checkout tests additionally need the storefront configured with a Stripe
//! test-mode secret key.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Storefront under test (default `http://localhost:3000`)
//! - `CAMPUS_EMAIL_DOMAIN` - Domain test accounts are created in (default `sggs.ac.in`)

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, multipart, redirect};

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "integration-test-pw";

/// Base URL for the storefront (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Campus domain test accounts are created in.
#[must_use]
pub fn campus_domain() -> String {
    std::env::var("CAMPUS_EMAIL_DOMAIN").unwrap_or_else(|_| "sggs.ac.in".to_string())
}

/// A fresh campus email address.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@{}", uuid::Uuid::new_v4().simple(), campus_domain())
}

/// A fresh listing name that can be found again on the listings page.
#[must_use]
pub fn unique_listing_name(prefix: &str) -> String {
    format!("{prefix} {}", uuid::Uuid::new_v4().simple())
}

/// A client with its own cookie jar (one browser session) that does not
/// follow redirects, so tests can assert on `Location`.
///
/// Each client presents its own `x-forwarded-for` address from the
/// benchmarking range. With `STOREFRONT_TRUSTED_PROXY_HOPS=1` the storefront
/// keys its rate limits on that address.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn session_client() -> Client {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let ip = format!("198.18.{}.{}", bytes[0], bytes[1]);

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&ip).expect("dotted quad is a valid header value"),
    );

    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// The `Location` header of a redirect response.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Find the `data-id` of the add-to-cart button for the listing `name`.
#[must_use]
pub fn listing_id_by_name(html: &str, name: &str) -> Option<String> {
    let marker = format!("data-name=\"{name}\"");
    let at = html.find(&marker)?;
    let before = html.get(..at)?;
    let id_start = before.rfind("data-id=\"")? + "data-id=\"".len();
    let rest = html.get(id_start..)?;
    let id_end = rest.find('"')?;
    rest.get(..id_end).map(String::from)
}

/// Sign up and log in a new account in this client's session.
///
/// Returns the account email.
///
/// # Panics
///
/// Panics if sign-up or login does not succeed.
pub async fn signup_and_login(client: &Client) -> String {
    let base = base_url();
    let email = unique_email();

    let resp = client
        .post(format!("{base}/auth/signup"))
        .form(&[("email", email.as_str()), ("password", TEST_PASSWORD)])
        .send()
        .await
        .expect("Failed to sign up");
    assert_eq!(
        location(&resp).as_deref(),
        Some("/auth/login?success=signed_up")
    );

    let resp = client
        .post(format!("{base}/auth/login"))
        .form(&[("email", email.as_str()), ("password", TEST_PASSWORD)])
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(location(&resp).as_deref(), Some("/?success=logged_in"));

    email
}

/// A tiny valid PNG for listing photos.
#[must_use]
pub fn tiny_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// List an item as the logged-in user and return its listing id.
///
/// # Panics
///
/// Panics if the listing is not created or cannot be found afterwards.
pub async fn create_listing(client: &Client, name: &str, price: &str) -> String {
    let base = base_url();

    let photo = multipart::Part::bytes(tiny_png())
        .file_name("photo.png")
        .mime_str("image/png")
        .expect("valid mime type");
    let form = multipart::Form::new()
        .text("name", name.to_string())
        .text("description", "Listed by the integration tests")
        .text("price", price.to_string())
        .part("photo", photo);

    let resp = client
        .post(format!("{base}/sell"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to submit listing");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/?success=listed"));

    let html = client
        .get(format!("{base}/"))
        .send()
        .await
        .expect("Failed to load listings")
        .text()
        .await
        .expect("Failed to read listings");

    listing_id_by_name(&html, name).expect("new listing is on the listings page")
}

/// Add a listing to this client's cart and return the `#cart-icon` fragment.
///
/// # Panics
///
/// Panics if the add is rejected.
pub async fn add_to_cart(client: &Client, id: &str) -> String {
    let resp = client
        .post(format!("{}/cart/add", base_url()))
        .form(&[("id", id)])
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.text().await.expect("Failed to read cart icon")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_id_by_name() {
        let html = r#"
            <button type="button" class="add-to-cart-btn" data-id="4" data-name="Lab coat" data-price="799">
            <button type="button" class="add-to-cart-btn" data-id="12" data-name="Calculator abc" data-price="1500">
        "#;
        assert_eq!(listing_id_by_name(html, "Calculator abc").as_deref(), Some("12"));
        assert_eq!(listing_id_by_name(html, "Lab coat").as_deref(), Some("4"));
        assert_eq!(listing_id_by_name(html, "Missing"), None);
    }

    #[test]
    fn test_unique_email_is_in_campus_domain() {
        let a = unique_email();
        assert!(a.ends_with(&format!("@{}", campus_domain())));
        assert_ne!(a, unique_email());
    }
}
