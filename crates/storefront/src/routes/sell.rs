//! Sell route handlers: list an item with a photo.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use tracing::instrument;

use campus_cart_core::Cents;

use crate::db::listings::ListingRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::NewListing;
use crate::routes::page::PageContext;
use crate::services::uploads::{UploadError, UploadStore};
use crate::state::AppState;

/// Sell page template.
#[derive(Template, WebTemplate)]
#[template(path = "sell.html")]
pub struct SellTemplate {
    pub page: PageContext,
    /// Upload limit as shown next to the photo field, e.g. `5 MB`.
    pub max_photo_size: String,
}

/// Fields collected from the sell form.
#[derive(Debug, Default)]
struct SellForm {
    name: String,
    description: String,
    price: String,
    photo: Option<(String, Vec<u8>)>,
}

/// Whole megabytes when the limit is a multiple of one, otherwise kilobytes.
fn human_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} KB", bytes.div_ceil(KB))
    }
}

fn back_with(code: &str) -> Redirect {
    Redirect::to(&format!("/sell?error={code}"))
}

/// Read every multipart field; an over-limit body is reported as such.
async fn read_form(mut multipart: Multipart) -> std::result::Result<SellForm, MultipartError> {
    let mut form = SellForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = field.text().await?.trim().to_string(),
            "description" => form.description = field.text().await?.trim().to_string(),
            "price" => form.price = field.text().await?,
            "photo" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                if !filename.is_empty() && !bytes.is_empty() {
                    form.photo = Some((filename, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Display the sell form.
pub async fn sell_page(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    page: PageContext,
) -> impl IntoResponse {
    SellTemplate {
        page,
        max_photo_size: human_size(state.config().uploads.max_bytes),
    }
}

/// Create a listing from the sell form.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn sell(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Redirect> {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::info!("Rejected oversized listing upload");
            return Ok(back_with("photo_too_large"));
        }
        Err(e) => return Err(AppError::BadRequest(e.body_text())),
    };

    if form.name.is_empty() || form.description.is_empty() {
        return Ok(back_with("missing_fields"));
    }

    let Ok(price) = Cents::from_decimal_str(&form.price) else {
        return Ok(back_with("invalid_price"));
    };

    let Some((filename, bytes)) = form.photo else {
        return Ok(back_with("photo_required"));
    };

    let photo = match UploadStore::new(&state.config().uploads.dir)
        .save(&filename, &bytes)
        .await
    {
        Ok(photo) => photo,
        Err(UploadError::Missing) => return Ok(back_with("photo_required")),
        Err(UploadError::UnsupportedType(_)) => return Ok(back_with("photo_type")),
        Err(e) => return Err(e.into()),
    };

    let id = ListingRepository::new(state.pool())
        .create(&NewListing {
            name: form.name,
            description: form.description,
            price,
            photo,
            seller_id: user.id,
        })
        .await?;

    tracing::info!(listing_id = %id, %price, "Listing created");
    Ok(Redirect::to("/?success=listed"))
}
