//! Cart route handlers.
//!
//! The cart lives in the session under one key. Full pages render it through
//! [`PageContext`]; the fragment endpoints let `cart.js` refresh individual
//! elements (`#cart-icon`, `#cart-items` + `#total`, `#cart-summary`) after an
//! add without reloading the page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use campus_cart_core::ListingId;

use crate::cart::{CartService, CartView, SessionCartStore};
use crate::db::listings::ListingRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::page::PageContext;
use crate::state::AppState;

/// Add to cart form data.
///
/// The browser also posts `name` and `price` from the button's data
/// attributes; they are ignored in favour of the stored listing.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub id: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "buy.html")]
pub struct BuyTemplate {
    pub page: PageContext,
    pub publishable_key: String,
}

/// `#cart-icon` fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_icon.html")]
pub struct CartIconTemplate {
    pub cart: CartView,
    /// Play the add-to-cart animation.
    pub bounce: bool,
}

/// `#cart-items` and `#total` fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// `#cart-summary` fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_summary.html")]
pub struct CartSummaryTemplate {
    pub cart: CartView,
}

fn cart_service(session: Session) -> CartService<SessionCartStore> {
    CartService::new(SessionCartStore::new(session))
}

/// Resolve a listing id from a path or form field.
async fn find_listing(state: &AppState, raw_id: &str) -> Result<crate::models::Listing> {
    let id: ListingId = raw_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid listing id {raw_id:?}")))?;

    ListingRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("listing {id}")))
}

/// Display cart page.
#[instrument(skip(page))]
pub async fn show(page: PageContext) -> impl IntoResponse {
    CartShowTemplate { page }
}

/// Display the checkout page.
#[instrument(skip(state, page))]
pub async fn buy(State(state): State<AppState>, page: PageContext) -> impl IntoResponse {
    BuyTemplate {
        page,
        publishable_key: state.config().stripe.publishable_key.clone(),
    }
}

/// Add a listing to the cart.
///
/// Returns the `#cart-icon` fragment with the bounce animation.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<impl IntoResponse> {
    let listing = find_listing(&state, &form.id).await?;
    let cart = cart_service(session).add(listing.to_cart_item()).await?;

    tracing::info!(listing_id = %listing.id, items = cart.len(), "Added to cart");

    Ok(CartIconTemplate {
        cart: CartView::from(&cart),
        bounce: true,
    })
}

/// Replace the cart with a single listing and go to checkout.
#[instrument(skip(state, session))]
pub async fn buy_now(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let listing = find_listing(&state, &id).await?;
    cart_service(session).buy_now(listing.to_cart_item()).await?;

    Ok(Redirect::to("/buy?success=added_to_cart"))
}

/// `#cart-icon` fragment.
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    let cart = cart_service(session).current().await;
    CartIconTemplate {
        cart: CartView::from(&cart),
        bounce: false,
    }
}

/// `#cart-items` and `#total` fragment.
#[instrument(skip(session))]
pub async fn items(session: Session) -> impl IntoResponse {
    let cart = cart_service(session).current().await;
    CartItemsTemplate {
        cart: CartView::from(&cart),
    }
}

/// `#cart-summary` fragment.
#[instrument(skip(session))]
pub async fn summary(session: Session) -> impl IntoResponse {
    let cart = cart_service(session).current().await;
    CartSummaryTemplate {
        cart: CartView::from(&cart),
    }
}
