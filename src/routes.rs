use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;

use crate::auth::accounts;
use crate::auth::middleware::JwtSecret;
use crate::notifications;
use crate::projects;
use crate::realtime::handler as ws_handler;
use crate::state::AppState;
use crate::tasks;
use crate::users;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on registration: 5 requests per minute per IP.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let registration_routes = Router::new()
        .route("/auth/register", axum::routing::post(accounts::register))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Public auth routes (no rate limiting)
    let auth_routes = Router::new()
        .route("/auth/login", axum::routing::post(accounts::login))
        .route(
            "/auth/verify-email",
            axum::routing::get(accounts::verify_email),
        );

    // Authenticated routes (JWT required — Claims extractor validates token)
    let user_routes = Router::new()
        .route("/users", axum::routing::get(users::list_users))
        .route("/users/{id}", axum::routing::get(users::user_details));

    let task_routes = Router::new()
        .route("/tasks", axum::routing::get(tasks::list_tasks))
        .route("/tasks", axum::routing::post(tasks::create_task))
        .route("/tasks/{id}", axum::routing::get(tasks::task_details))
        .route("/tasks/{id}", axum::routing::put(tasks::update_task))
        .route("/tasks/{id}", axum::routing::delete(tasks::delete_task))
        .route(
            "/tasks/{id}/status",
            axum::routing::patch(tasks::update_task_status),
        );

    let project_routes = Router::new()
        .route("/projects", axum::routing::get(projects::list_projects))
        .route("/projects", axum::routing::post(projects::create_project))
        .route(
            "/projects/{id}",
            axum::routing::get(projects::project_details),
        )
        .route(
            "/projects/{id}",
            axum::routing::put(projects::update_project),
        )
        .route(
            "/projects/{id}",
            axum::routing::delete(projects::delete_project),
        );

    let notification_routes = Router::new()
        .route(
            "/notifications",
            axum::routing::get(notifications::list_notifications),
        )
        .route(
            "/notifications/read",
            axum::routing::patch(notifications::mark_notifications_read),
        );

    // WebSocket endpoints (auth via query param, not JWT header)
    let ws_routes = Router::new()
        .route(
            "/ws/notifications",
            axum::routing::get(ws_handler::ws_notifications),
        )
        .route("/ws/tasks", axum::routing::get(ws_handler::ws_tasks))
        .route("/ws/projects", axum::routing::get(ws_handler::ws_projects));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    // CORS for the browser client
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .cors_origin
                .parse::<HeaderValue>()
                .expect("Invalid cors_origin"),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Router::new()
        .merge(registration_routes)
        .merge(auth_routes)
        .merge(user_routes)
        .merge(task_routes)
        .merge(project_routes)
        .merge(notification_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
