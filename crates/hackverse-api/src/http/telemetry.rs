//! Per-route request counting.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use hackverse_telemetry::Metrics;

/// Count the request under its route template and final status code.
///
/// Runs as a route layer, so the matched template (never the raw path) labels
/// the counter and unknown paths cannot inflate label cardinality.
pub(crate) async fn record_http_metrics(
    State(metrics): State<Metrics>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str)
        .to_string();
    let response = next.run(request).await;
    metrics.inc_http_request(&route, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn counts_requests_by_route_template() -> Result<(), Box<dyn std::error::Error>> {
        let metrics = Metrics::new()?;
        let router = Router::new()
            .route("/items/{id}", get(|| async { StatusCode::NO_CONTENT }))
            .route_layer(middleware::from_fn_with_state(
                metrics.clone(),
                record_http_metrics,
            ));

        for id in ["1", "2"] {
            let request = Request::builder()
                .uri(format!("/items/{id}"))
                .body(Body::empty())?;
            let response = router.clone().oneshot(request).await?;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let rendered = metrics.render()?;
        let line = rendered
            .lines()
            .find(|line| line.contains(r#"route="/items/{id}""#))
            .ok_or("route template missing from exposition")?;
        assert!(line.contains(r#"code="204""#));
        assert!(line.ends_with(" 2"));
        Ok(())
    }
}
