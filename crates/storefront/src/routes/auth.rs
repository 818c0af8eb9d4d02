//! Authentication route handlers.
//!
//! Sign-up is restricted to the configured campus email domain; login is
//! email and password against the local user table.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, report, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_session, set_current_user};
use crate::models::CurrentUser;
use crate::routes::page::PageContext;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Sign-up form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
}

/// Sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub page: PageContext,
    pub campus_domain: String,
}

/// Query code for a failed sign-up.
fn signup_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::OutsideCampus(_) => "outside_campus",
        AuthError::UserAlreadyExists => "email_taken",
        AuthError::InvalidEmail(_) => "invalid_email",
        AuthError::WeakPassword(_) => "password_too_short",
        AuthError::InvalidCredentials | AuthError::Repository(_) | AuthError::PasswordHash => {
            "failed"
        }
    }
}

// =============================================================================
// Sign-up Routes
// =============================================================================

/// Display the sign-up page.
pub async fn signup_page(State(state): State<AppState>, page: PageContext) -> impl IntoResponse {
    SignupTemplate {
        page,
        campus_domain: state.config().campus.email_domain.clone(),
    }
}

/// Handle sign-up form submission.
#[instrument(skip(state, form))]
pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> Redirect {
    let auth = AuthService::new(state.pool(), &state.config().campus.email_domain);

    match auth.register_with_password(&form.email, &form.password).await {
        Ok(_) => Redirect::to("/auth/login?success=signed_up"),
        Err(e) => {
            if matches!(e, AuthError::Repository(_) | AuthError::PasswordHash) {
                report(&e);
            } else {
                tracing::info!(error = %e, "Sign-up rejected");
            }
            Redirect::to(&format!("/auth/signup?error={}", signup_error_code(&e)))
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: PageContext) -> impl IntoResponse {
    LoginTemplate { page }
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Redirect {
    let auth = AuthService::new(state.pool(), &state.config().campus.email_domain);

    let user = match auth.login_with_password(&form.email, &form.password).await {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login failed");
            return Redirect::to("/auth/login?error=credentials");
        }
        Err(e) => {
            report(&e);
            return Redirect::to("/auth/login?error=failed");
        }
    };

    let current = CurrentUser::from(&user);
    if let Err(e) = set_current_user(&session, &current).await {
        tracing::error!("Failed to set session: {}", e);
        return Redirect::to("/auth/login?error=session");
    }

    set_sentry_user(&current.id, Some(current.email.as_str()));
    tracing::info!(user_id = %current.id, "User logged in");
    Redirect::to("/?success=logged_in")
}

/// Handle logout.
///
/// Destroys the whole session, including the cart.
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_session(&session).await {
        tracing::error!("Failed to flush session: {}", e);
    }
    clear_sentry_user();

    Redirect::to("/?success=logged_out")
}
