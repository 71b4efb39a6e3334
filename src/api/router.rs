use axum::{middleware, routing::get, Router};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::health;
use super::middleware::{gateway_middleware, logging_middleware};
use super::state::AppState;

/// Assemble the full application: health endpoints stay outside the gateway,
/// everything in `protected` goes through validate/admit/cache/record.
///
/// The catch-panic layer sits between the gateway and the handlers, so a
/// panicking handler surfaces to the gateway as a plain 500 response and
/// still gets annotated and recorded.
pub fn create_router(state: AppState, protected: Router) -> Router {
    let gateway = protected
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(state, gateway_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .merge(gateway)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}
