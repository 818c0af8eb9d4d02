//! Listings page: every item for sale.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::db::listings::ListingRepository;
use crate::error::Result;
use crate::filters;
use crate::models::Listing;
use crate::routes::page::PageContext;
use crate::state::AppState;

/// Listing display data for templates.
#[derive(Debug, Clone)]
pub struct ListingView {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Integer cents for the `data-price` attribute.
    pub price_cents: u64,
    /// Formatted price, e.g. `$15.00`.
    pub price: String,
    pub photo_url: String,
    pub seller: String,
}

impl From<&Listing> for ListingView {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id.to_string(),
            name: listing.name.clone(),
            description: listing.description.clone(),
            price_cents: listing.price.as_u64(),
            price: listing.price.display(),
            photo_url: listing.photo_url(),
            seller: listing.seller_email.to_string(),
        }
    }
}

/// Listings page template.
#[derive(Template, WebTemplate)]
#[template(path = "listings.html")]
pub struct ListingsTemplate {
    pub page: PageContext,
    pub listings: Vec<ListingView>,
}

/// Display every listing.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let listings = ListingRepository::new(state.pool()).list_all().await?;

    Ok(ListingsTemplate {
        page,
        listings: listings.iter().map(ListingView::from).collect(),
    })
}
