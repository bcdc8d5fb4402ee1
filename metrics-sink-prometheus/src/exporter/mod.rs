#[cfg(feature = "http-listener")]
use std::future::Future;
#[cfg(feature = "http-listener")]
use std::io;
#[cfg(feature = "http-listener")]
use std::pin::Pin;

#[cfg(feature = "http-listener")]
use thiserror::Error as ThisError;

/// Error types possible from an exporter.
#[cfg(feature = "http-listener")]
#[derive(Debug, ThisError)]
pub enum ExporterError {
    /// The HTTP listener stopped serving the scrape endpoint.
    #[error("failed to serve scrape endpoint: {0}")]
    HttpListener(#[from] io::Error),
}

/// Convenience type for Future implementing an exporter.
#[cfg(feature = "http-listener")]
pub type ExporterFuture = Pin<Box<dyn Future<Output = Result<(), ExporterError>> + Send + 'static>>;

#[cfg(feature = "http-listener")]
mod collector;

#[cfg(feature = "http-listener")]
mod http_listener;

pub(crate) mod builder;
