//! User account commands.
//!
//! # Usage
//!
//! ```bash
//! cc-cli user create -e student@sggs.ac.in -p 'long enough password'
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for storefront
//! - `CAMPUS_EMAIL_DOMAIN` - Domain accounts must belong to (default `sggs.ac.in`)

use campus_cart_core::UserId;
use campus_cart_storefront::db;
use campus_cart_storefront::services::auth::{AuthError, AuthService};

use super::migrate::{MigrationError, database_url};

/// Domain used when `CAMPUS_EMAIL_DOMAIN` is unset.
pub(crate) const DEFAULT_CAMPUS_DOMAIN: &str = "sggs.ac.in";

/// Campus domain from the environment, normalized like the storefront does.
pub(crate) fn campus_domain() -> String {
    std::env::var("CAMPUS_EMAIL_DOMAIN")
        .unwrap_or_else(|_| DEFAULT_CAMPUS_DOMAIN.to_string())
        .trim()
        .trim_start_matches('@')
        .to_ascii_lowercase()
}

/// Errors that can occur while managing users.
#[derive(Debug, thiserror::Error)]
pub enum UserCommandError {
    /// Configuration or connection problem.
    #[error(transparent)]
    Setup(#[from] MigrationError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Account rules rejected the user.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a new password account.
///
/// Applies the same campus-domain and password rules as web sign-up.
///
/// # Errors
///
/// Returns an error if the email or password is rejected, the email is
/// already registered, or the database is unreachable.
pub async fn create_user(email: &str, password: &str) -> Result<UserId, UserCommandError> {
    let database_url = database_url()?;
    let domain = campus_domain();

    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool, &domain)
        .register_with_password(email, password)
        .await?;

    tracing::info!("User created successfully! ID: {}, Email: {}", user.id, user.email);
    Ok(user.id)
}
