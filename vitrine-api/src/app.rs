/// Application state and router builder
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/                     # Credential flows (public)
///     │   ├── POST /register
///     │   ├── POST /login
///     │   ├── POST /logout
///     │   ├── POST /verify-email
///     │   ├── POST /resend-verification
///     │   ├── POST /forgot-password
///     │   └── POST /reset-password
///     ├── /profile                   # Self-service (session required)
///     │   ├── GET / PUT / DELETE
///     └── /admin/users               # Admin only
///         ├── GET  /  POST /
///         └── GET / PATCH / DELETE /:id
/// ```
///
/// The session credential travels as `Authorization: Bearer <session_id>`
/// and is treated as an opaque string. Two middleware layers wrap the
/// protected groups, both delegating to the core's `AuthorizationGate` —
/// route handlers never re-check privileges themselves.
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use vitrine_core::auth::{AuthService, AuthorizationGate};
use vitrine_core::models::User;
use vitrine_core::store::UserStore;

/// Shared application state, cloned per request handler.
#[derive(Clone)]
pub struct AppState {
    /// The credential state machine
    pub auth: Arc<AuthService>,

    /// The single authorization entry point for privileged routes
    pub gate: Arc<AuthorizationGate>,

    /// Direct user reads for the admin screens
    pub users: Arc<dyn UserStore>,

    /// Pool handle for the health endpoint; None when running on the
    /// in-memory backend
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, users: Arc<dyn UserStore>, db: Option<PgPool>) -> Self {
        let gate = Arc::new(AuthorizationGate::new(auth.clone()));

        Self {
            auth,
            gate,
            users,
            db,
        }
    }
}

/// The authenticated caller, injected into request extensions by the
/// session middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The session credential the caller presented
    pub session_id: String,

    /// The session's owner
    pub user: User,
}

/// Builds the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Credential flows are public by nature; logout reads the bearer
    // header itself.
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/verify-email", post(routes::auth::verify_email))
        .route("/resend-verification", post(routes::auth::resend_verification))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password", post(routes::auth::reset_password));

    // Self-service: any valid session.
    let profile_routes = Router::new()
        .route(
            "/",
            get(routes::profile::get_profile)
                .put(routes::profile::update_profile)
                .delete(routes::profile::delete_profile),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_auth_layer,
        ));

    // User management: admin sessions only.
    let admin_routes = Router::new()
        .route(
            "/users",
            get(routes::admin_users::list_users).post(routes::admin_users::create_user),
        )
        .route(
            "/users/:id",
            get(routes::admin_users::get_user)
                .patch(routes::admin_users::update_user)
                .delete(routes::admin_users::delete_user),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/profile", profile_routes)
        .nest("/admin", admin_routes);

    // The storefront UI and this API share an origin in production;
    // permissive CORS covers local development.
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pulls the opaque session id out of the Authorization header.
pub fn bearer_session(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))
}

/// Session middleware: requires a valid session and injects [`CurrentUser`].
async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session_id = bearer_session(req.headers())?.to_string();

    let user = state.gate.require_user(&session_id).await?;

    req.extensions_mut().insert(CurrentUser { session_id, user });

    Ok(next.run(req).await)
}

/// Admin middleware: requires a valid session owned by an admin.
async fn admin_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session_id = bearer_session(req.headers())?.to_string();

    let user = state.gate.require_admin(&session_id).await?;

    req.extensions_mut().insert(CurrentUser { session_id, user });

    Ok(next.run(req).await)
}
