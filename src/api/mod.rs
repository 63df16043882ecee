//! HTTP surface: router wiring, middleware stack and server bootstrap.

pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

use crate::{
    auth::{AccessGuard, Authenticator, PasswordHasher, TokenCodec, require_auth},
    store::Stores,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, options},
};
use handlers::{health, root};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

const REQUEST_ID: &str = "x-request-id";

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub stores: Stores,
    pub authenticator: Authenticator,
    pub guard: Arc<AccessGuard>,
}

impl AppState {
    #[must_use]
    pub fn new(stores: Stores, hasher: PasswordHasher, codec: Arc<TokenCodec>) -> Self {
        let authenticator =
            Authenticator::new(stores.credentials.clone(), hasher, Arc::clone(&codec));
        let guard = Arc::new(AccessGuard::new(codec, stores.credentials.clone()));
        Self {
            stores,
            authenticator,
            guard,
        }
    }
}

/// Build the full application router.
///
/// Protected routes sit behind [`require_auth`] as a route layer, so unknown
/// paths still answer 404 instead of 401.
pub fn router(state: Arc<AppState>) -> Router {
    let (public, mut openapi) = openapi::public_router().split_for_parts();
    let (protected, protected_doc) = openapi::protected_router().split_for_parts();
    openapi.merge(protected_doc);
    openapi::finish(&mut openapi);

    let protected = protected.route_layer(middleware::from_fn_with_state(
        Arc::clone(&state.guard),
        require_auth,
    ));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(Any);

    public
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
}

/// Serve until ctrl-c.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
