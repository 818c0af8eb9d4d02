//! Listing repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use campus_cart_core::{Cents, Email, ListingId, UserId};

use super::RepositoryError;
use crate::models::{Listing, NewListing};

const SELECT_LISTING: &str = r"
    SELECT l.id, l.name, l.description, l.price_cents, l.photo,
           l.seller_id, u.email AS seller_email, l.created_at
    FROM listings l
    JOIN users u ON u.id = l.seller_id
";

/// Repository for listing database operations.
pub struct ListingRepository<'a> {
    pool: &'a PgPool,
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: i32,
    name: String,
    description: String,
    price_cents: i64,
    photo: String,
    seller_id: i32,
    seller_email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = RepositoryError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let price = Cents::try_from(row.price_cents).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for listing {}: {e}", row.id))
        })?;
        let seller_email = Email::parse(&row.seller_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: ListingId::new(row.id),
            name: row.name,
            description: row.description,
            price,
            photo: row.photo,
            seller_id: UserId::new(row.seller_id),
            seller_email,
            created_at: row.created_at,
        })
    }
}

impl<'a> ListingRepository<'a> {
    /// Create a new listing repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All listings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{SELECT_LISTING} ORDER BY l.created_at DESC, l.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Listing::try_from).collect()
    }

    /// Get a listing by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ListingId) -> Result<Option<Listing>, RepositoryError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!("{SELECT_LISTING} WHERE l.id = $1"))
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        row.map(Listing::try_from).transpose()
    }

    /// Insert a new listing and return its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the price does not fit the column.
    /// Returns `RepositoryError::Database` for database errors.
    pub async fn create(&self, listing: &NewListing) -> Result<ListingId, RepositoryError> {
        let price_cents = listing
            .price
            .as_i64()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO listings (name, description, price_cents, photo, seller_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(&listing.name)
        .bind(&listing.description)
        .bind(price_cents)
        .bind(&listing.photo)
        .bind(listing.seller_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(ListingId::new(id))
    }
}
