// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{answers, attempts, auth, lessons, overrides, retakes},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, weeks/lessons, attempts, answers, overrides).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (lessons client, autosave controller, config).
pub fn create_router(state: AppState) -> Router {
    let mut origins = vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];
    if let Ok(own) = HeaderValue::from_str(&format!("http://{}", state.config.listen_addr)) {
        if !origins.contains(&own) {
            origins.push(own);
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/email-code", post(auth::request_email_code))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let week_routes = Router::new()
        .route("/", get(lessons::list_weeks))
        .route("/active", get(lessons::get_active_week))
        .route("/{id}/lessons", get(lessons::list_lessons))
        .route("/{id}/lessons/all", get(lessons::list_all_lessons));

    let attempt_routes = Router::new()
        .route(
            "/",
            get(attempts::list_attempts_for_user).post(attempts::start_attempt),
        )
        .route("/record", post(attempts::record_attempt))
        .route("/lessons", get(attempts::list_attempts_for_lessons))
        .route("/{id}/submit", post(attempts::submit_attempt));

    let lesson_routes = Router::new()
        .route("/{id}/retake", get(retakes::get_retake_status))
        .route("/{id}/retake/use", post(retakes::use_one_retake))
        .route("/{id}/retake/grant", post(retakes::grant_retake))
        .route("/{id}/answers/bind", post(answers::bind_answers))
        .route("/{id}/answers/flush", post(answers::flush_answers))
        .route("/{id}/answers/{qid}", put(answers::edit_answer))
        .route("/{id}/answers/{qid}/blur", post(answers::blur_answer));

    let override_routes = Router::new().route(
        "/{lesson_id}/{student_id}",
        get(overrides::get_override).put(overrides::save_override),
    );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/weeks", week_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/lessons", lesson_routes)
        .nest("/api/overrides", override_routes)
        .route("/api/students", get(lessons::list_students))
        .route("/api/content", get(lessons::get_content))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
