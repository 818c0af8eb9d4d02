//! User domain types.

use chrono::{DateTime, Utc};

use campus_cart_core::{Email, UserId};

/// A campus account.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Campus email address.
    pub email: Email,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl From<&User> for super::CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}
