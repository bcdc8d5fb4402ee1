use std::{
    io,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use http_body_util::Full;
use hyper::{
    body::{self, Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1::Builder as HyperHttpBuilder,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use ipnet::IpNet;
use tokio::net::{TcpListener, TcpStream};
use tracing::warn;

use crate::{common::BuildError, formatting, PrometheusHandle};

use super::{ExporterError, ExporterFuture};

struct HttpListeningExporter {
    inner: Arc<Inner>,
}

struct Inner {
    handle: PrometheusHandle,
    allowed_addresses: Option<Vec<IpNet>>,
}

impl HttpListeningExporter {
    async fn serve(&self, listener: std::net::TcpListener) -> io::Result<()> {
        let listener = TcpListener::from_std(listener)?;

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Error accepting connection. Ignoring request. Error: {:?}", e);
                    continue;
                }
            };

            let remote_addr = match stream.peer_addr() {
                Ok(remote_address) => remote_address.ip(),
                Err(e) => {
                    warn!("Error obtaining remote address. Ignoring request. Error: {:?}", e);
                    continue;
                }
            };

            self.process_stream(stream, remote_addr);
        }
    }

    fn process_stream(&self, stream: TcpStream, remote_address: IpAddr) {
        let inner = self.inner.clone();
        let service = service_fn(move |req: Request<body::Incoming>| {
            let inner = inner.clone();
            async move { Self::handle_http_request(&inner, remote_address, &req) }
        });

        tokio::task::spawn(async move {
            if let Err(err) =
                HyperHttpBuilder::new().serve_connection(TokioIo::new(stream), service).await
            {
                warn!("Error serving connection. Error: {:?}", err);
            };
        });
    }

    fn handle_http_request(
        inner: &Arc<Inner>,
        remote_address: IpAddr,
        req: &Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let is_allowed = match &inner.allowed_addresses {
            Some(addresses) => addresses.iter().any(|address| address.contains(&remote_address)),
            None => true,
        };

        if !is_allowed {
            return Ok(Self::new_forbidden_response());
        }

        Ok(match req.uri().path() {
            "/health" => Response::new("OK".into()),
            _ => Self::new_metrics_response(inner.handle.render()),
        })
    }

    fn new_metrics_response(output: String) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::from(output));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(formatting::CONTENT_TYPE));
        response
    }

    fn new_forbidden_response() -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::<Bytes>::default());
        *response.status_mut() = StatusCode::FORBIDDEN;
        response
    }
}

/// Creates an `ExporterFuture` implementing a http listener that serves prometheus metrics.
///
/// # Errors
/// Will return Err if it cannot bind to the listen address
pub(super) fn new_http_listener(
    handle: PrometheusHandle,
    listen_address: SocketAddr,
    allowed_addresses: Option<Vec<IpNet>>,
) -> Result<ExporterFuture, BuildError> {
    let listener = std::net::TcpListener::bind(listen_address)
        .and_then(|listener| {
            listener.set_nonblocking(true)?;
            Ok(listener)
        })
        .map_err(|e| BuildError::FailedToCreateHTTPListener(e.to_string()))?;

    let exporter = HttpListeningExporter { inner: Arc::new(Inner { handle, allowed_addresses }) };

    Ok(Box::pin(async move { exporter.serve(listener).await.map_err(ExporterError::from) }))
}
