//! Seed the storefront with demo listings.
//!
//! Reads a YAML file describing one seller account and the listings it
//! offers, copies each photo into the upload directory, and inserts the
//! listings. Running it twice inserts the listings twice; the seller account
//! is reused.
//!
//! ```yaml
//! seller:
//!   email: demo.seller@sggs.ac.in
//!   password: campus-cart-demo
//! listings:
//!   - name: Scientific calculator
//!     description: Casio fx-991ES, barely used.
//!     price: "15.00"
//!     photo: photos/placeholder.png   # relative to the YAML file
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for storefront
//! - `STOREFRONT_UPLOAD_DIR` - Where photos are copied (default `crates/storefront/static/uploads`)
//! - `CAMPUS_EMAIL_DOMAIN` - Domain the seller must belong to

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info, warn};

use campus_cart_core::{Cents, Email, UserId};
use campus_cart_storefront::db;
use campus_cart_storefront::db::listings::ListingRepository;
use campus_cart_storefront::db::users::UserRepository;
use campus_cart_storefront::models::NewListing;
use campus_cart_storefront::services::auth::AuthService;
use campus_cart_storefront::services::uploads::UploadStore;

use super::migrate::database_url;
use super::user::campus_domain;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub seller: SeedSeller,
    #[serde(default)]
    pub listings: Vec<SeedListing>,
}

/// Account that owns every seeded listing.
#[derive(Debug, Deserialize)]
pub struct SeedSeller {
    pub email: String,
    pub password: String,
}

/// One listing to insert.
#[derive(Debug, Deserialize)]
pub struct SeedListing {
    pub name: String,
    pub description: String,
    /// Decimal price, e.g. `"12.50"`.
    pub price: String,
    /// Photo path relative to the seed file.
    pub photo: String,
}

/// Outcome of a seeding run.
#[derive(Debug, Default)]
pub struct SeedResult {
    pub inserted: usize,
    pub errors: Vec<(String, String)>,
}

/// Check every listing before touching the database.
///
/// Returns one message per problem.
#[must_use]
pub fn validate_seed(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    if Email::parse(&seed.seller.email).is_err() {
        errors.push(format!("seller: invalid email {:?}", seed.seller.email));
    }

    for (index, listing) in seed.listings.iter().enumerate() {
        let label = if listing.name.trim().is_empty() {
            format!("listing #{}", index + 1)
        } else {
            listing.name.clone()
        };

        if listing.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if listing.description.trim().is_empty() {
            errors.push(format!("{label}: description is empty"));
        }
        if let Err(e) = Cents::from_decimal_str(&listing.price) {
            errors.push(format!("{label}: invalid price {:?} ({e})", listing.price));
        }
        if listing.photo.trim().is_empty() {
            errors.push(format!("{label}: photo is empty"));
        }
    }

    errors
}

/// Seed listings from a YAML file.
///
/// # Errors
///
/// Returns an error if environment variables are missing, the file cannot be
/// read or fails validation, or the seller cannot be created.
pub async fn listings(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;
    let upload_dir = PathBuf::from(
        std::env::var("STOREFRONT_UPLOAD_DIR")
            .unwrap_or_else(|_| "crates/storefront/static/uploads".to_string()),
    );

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed listings from file");

    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    info!(listings = seed.listings.len(), "Parsed seed file");

    let errors = validate_seed(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    tokio::fs::create_dir_all(&upload_dir).await?;

    let seller_id = ensure_seller(&pool, &seed.seller).await?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let result = insert_listings(&pool, seller_id, &seed.listings, base_dir, &upload_dir).await;

    info!("Seeding complete!");
    info!("  Listings inserted: {}", result.inserted);

    if !result.errors.is_empty() {
        error!("  Errors: {}", result.errors.len());
        for (listing, err) in &result.errors {
            error!("    - {listing}: {err}");
        }
    }

    Ok(())
}

/// Reuse the seller account if it exists, otherwise register it.
async fn ensure_seller(
    pool: &PgPool,
    seller: &SeedSeller,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let email = Email::parse(&seller.email)?;

    if let Some((user, _)) = UserRepository::new(pool).get_password_hash(&email).await? {
        info!(user_id = %user.id, "Reusing existing seller");
        return Ok(user.id);
    }

    let domain = campus_domain();
    let user = AuthService::new(pool, &domain)
        .register_with_password(&seller.email, &seller.password)
        .await?;

    info!(user_id = %user.id, "Created seller");
    Ok(user.id)
}

async fn insert_listings(
    pool: &PgPool,
    seller_id: UserId,
    listings: &[SeedListing],
    base_dir: &Path,
    upload_dir: &Path,
) -> SeedResult {
    let repo = ListingRepository::new(pool);
    let uploads = UploadStore::new(upload_dir);
    let mut result = SeedResult::default();

    for listing in listings {
        let photo_path = base_dir.join(&listing.photo);
        let bytes = match tokio::fs::read(&photo_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(photo = %photo_path.display(), "Photo not readable");
                result.errors.push((listing.name.clone(), e.to_string()));
                continue;
            }
        };

        let photo = match uploads.save(&listing.photo, &bytes).await {
            Ok(photo) => photo,
            Err(e) => {
                result.errors.push((listing.name.clone(), e.to_string()));
                continue;
            }
        };

        // Validated above
        let Ok(price) = Cents::from_decimal_str(&listing.price) else {
            continue;
        };

        let new_listing = NewListing {
            name: listing.name.trim().to_string(),
            description: listing.description.trim().to_string(),
            price,
            photo,
            seller_id,
        };

        match repo.create(&new_listing).await {
            Ok(id) => {
                info!(listing_id = %id, name = %new_listing.name, "Inserted listing");
                result.inserted += 1;
            }
            Err(e) => result.errors.push((listing.name.clone(), e.to_string())),
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r#"
seller:
  email: demo.seller@sggs.ac.in
  password: campus-cart-demo
listings:
  - name: Scientific calculator
    description: Casio fx-991ES
    price: "15.00"
    photo: photos/placeholder.png
  - name: Lab coat
    description: Size M
    price: "7.99"
    photo: photos/placeholder.png
"#;

    #[test]
    fn test_seed_file_parses_and_validates() {
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        assert_eq!(seed.listings.len(), 2);
        assert_eq!(seed.listings[1].price, "7.99");
        assert!(validate_seed(&seed).is_empty());
    }

    #[test]
    fn test_validation_reports_each_problem() {
        let mut seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        seed.seller.email = "not-an-email".to_string();
        seed.listings[0].price = "free".to_string();
        seed.listings[1].name = "  ".to_string();
        seed.listings[1].photo = String::new();

        let errors = validate_seed(&seed);
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.starts_with("seller:")));
        assert!(errors.iter().any(|e| e.contains("invalid price \"free\"")));
        assert!(errors.iter().any(|e| e == "listing #2: name is empty"));
        assert!(errors.iter().any(|e| e == "listing #2: photo is empty"));
    }

    #[test]
    fn test_validation_rejects_unstorable_price() {
        let mut seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        seed.listings[0].price = "100000000000000000".to_string();

        let errors = validate_seed(&seed);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("price cannot exceed $999999.99"), "{errors:?}");
    }
}
