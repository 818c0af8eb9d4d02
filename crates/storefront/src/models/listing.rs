//! Listing domain types.

use chrono::{DateTime, Utc};

use campus_cart_core::{CartItem, Cents, Email, ListingId, UserId};

/// An item offered for sale.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: ListingId,
    pub name: String,
    pub description: String,
    pub price: Cents,
    /// File name under the upload directory.
    pub photo: String,
    pub seller_id: UserId,
    pub seller_email: Email,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Public URL of the listing photo.
    #[must_use]
    pub fn photo_url(&self) -> String {
        format!("/uploads/{}", urlencoding::encode(&self.photo))
    }

    /// The cart line this listing becomes when added to a cart.
    #[must_use]
    pub fn to_cart_item(&self) -> CartItem {
        CartItem::new(self.id.to_string(), self.name.clone(), self.price)
    }
}

/// Validated input for creating a listing.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub name: String,
    pub description: String,
    pub price: Cents,
    pub photo: String,
    pub seller_id: UserId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        Listing {
            id: ListingId::new(12),
            name: "Engineering Drawing Kit".to_string(),
            description: "Barely used".to_string(),
            price: Cents::new(45_000),
            photo: "20260101120000_drafter set.jpg".to_string(),
            seller_id: UserId::new(3),
            seller_email: Email::parse("seller@sggs.ac.in").unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_to_cart_item_uses_listing_identity_and_price() {
        let item = listing().to_cart_item();
        assert_eq!(item.id, "12");
        assert_eq!(item.name, "Engineering Drawing Kit");
        assert_eq!(item.price, Cents::new(45_000));
    }

    #[test]
    fn test_photo_url_is_encoded() {
        assert_eq!(
            listing().photo_url(),
            "/uploads/20260101120000_drafter%20set.jpg"
        );
    }
}
