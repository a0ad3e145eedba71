//! Request metrics middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::telemetry::metrics::record_request_latency;

/// Collapses identifier segments so per-invitation and per-driver URLs
/// (`/invitations/<uuid>/cancel`, `/drivers/<uuid>`) share one metric
/// series instead of minting a label value per UUID.
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = route_label(request.uri().path());
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    record_request_latency(&method, &route, response.status().as_u16(), start.elapsed());

    response
}
