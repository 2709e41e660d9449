//! The minimal HTTP server exposing the exporter's metrics

use std::sync::Arc;

use http_body_util::Full;
use hyper::{
    body::{Bytes as BytesBody, Incoming as IncomingBody},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1::Builder as Http1Builder,
    service::service_fn,
    Error as HyperError, Request, Response, StatusCode,
};
use hyper_util::rt::{TokioIo, TokioTimer};
use matchit::Router;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{error::ExporterError, registry::MetricRegistry};

use self::routes::{Handler, MetricsHandler, METRICS_ROUTE};

pub mod routes;

/// A type for the full response body
pub type ResponseBody = Full<BytesBody>;

/// The router type used by the server
type HttpRouter = Router<Box<dyn Handler>>;

/// Create a response body from an `Into` type
pub fn resp_body<T: Into<BytesBody>>(body: T) -> ResponseBody {
    Full::new(body.into())
}

/// Build a response with the given status, content type, and body
pub fn build_response<T: Into<BytesBody>>(
    status: StatusCode,
    content_type: &'static str,
    body: T,
) -> Response<ResponseBody> {
    let mut resp = Response::new(resp_body(body));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

/// The HTTP server for the exporter
#[derive(Clone)]
pub struct HttpServer {
    /// The router for the HTTP server, used to match routes
    router: Arc<HttpRouter>,
}

impl HttpServer {
    /// Create a new HTTP server serving the given registry
    pub fn new(registry: Arc<MetricRegistry>) -> Result<Self, ExporterError> {
        let router = Self::build_router(registry)?;
        Ok(Self { router: Arc::new(router) })
    }

    /// Build the router for the HTTP server
    fn build_router(registry: Arc<MetricRegistry>) -> Result<HttpRouter, ExporterError> {
        let mut router: HttpRouter = Router::new();
        router
            .insert(METRICS_ROUTE, Box::new(MetricsHandler::new(registry)))
            .map_err(ExporterError::http_server)?;

        Ok(router)
    }

    /// Serve an http request
    async fn serve_request(&self, req: Request<IncomingBody>) -> Response<ResponseBody> {
        if let Ok(matched_path) = self.router.at(req.uri().path()) {
            let handler = matched_path.value;
            let url_params =
                matched_path.params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            handler.as_ref().handle(req, url_params).await
        } else {
            build_response(StatusCode::NOT_FOUND, "text/plain", "Not found")
        }
    }

    /// The execution loop for the http server, accepts incoming connections
    /// on the listener and serves them until `cancel` fires
    pub async fn execution_loop(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), ExporterError> {
        if let Ok(addr) = listener.local_addr() {
            info!("Serving metrics on: {addr}");
        }

        loop {
            let (stream, _) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                res = listener.accept() => res.map_err(ExporterError::http_server)?,
            };

            let self_clone = self.clone();
            let conn_cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = conn_cancel.cancelled() => {},
                    res = self_clone.handle_stream(stream) => {
                        if let Err(e) = res {
                            error!("Error handling stream: {e}");
                        }
                    },
                }
            });
        }
    }

    /// Handle an incoming TCP stream
    async fn handle_stream(&self, stream: TcpStream) -> Result<(), ExporterError> {
        let service_fn = service_fn(move |req: Request<IncomingBody>| {
            let self_clone = self.clone();
            async move { Ok::<_, HyperError>(self_clone.serve_request(req).await) }
        });

        let stream_io = TokioIo::new(stream);
        Http1Builder::new()
            .timer(TokioTimer::new())
            .serve_connection(stream_io, service_fn)
            .await
            .map_err(ExporterError::http_server)
    }
}
