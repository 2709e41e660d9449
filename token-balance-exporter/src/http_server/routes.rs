//! The routes for the HTTP server

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use hyper::{body::Incoming as IncomingBody, Method, Request, Response, StatusCode};

use crate::{
    http_server::{build_response, ResponseBody},
    registry::MetricRegistry,
};

/// The parameters matched from a route's path
pub type UrlParams = HashMap<String, String>;

/// A handler is attached to a route and handles the process of translating an
/// abstract request type into a response
#[async_trait]
pub trait Handler: Send + Sync {
    /// The handler method for the request/response on the handler's route
    async fn handle(
        &self,
        req: Request<IncomingBody>,
        url_params: UrlParams,
    ) -> Response<ResponseBody>;
}

// -----------------
// | METRICS ROUTE |
// -----------------

/// The route for the metrics endpoint
pub const METRICS_ROUTE: &str = "/metrics";

/// The content type of the Prometheus text exposition format
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// The handler for the metrics endpoint
pub struct MetricsHandler {
    /// The registry rendered on each scrape
    registry: Arc<MetricRegistry>,
}

impl MetricsHandler {
    /// Create a new metrics handler
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Handler for MetricsHandler {
    async fn handle(&self, req: Request<IncomingBody>, _: UrlParams) -> Response<ResponseBody> {
        if req.method() != Method::GET {
            return build_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "text/plain",
                "Method not allowed",
            );
        }

        build_response(StatusCode::OK, PROMETHEUS_CONTENT_TYPE, self.registry.render())
    }
}
