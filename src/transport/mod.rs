//! Transport contract
//!
//! The executor never talks to the network itself. A [`Transport`] receives the
//! encoded [`Request`], reports the remote status and body through a
//! [`ResponseWriter`], and may read or write the reference store while doing so.

use crate::core::BoxError;
use crate::store::Store;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Status reported when a call succeeded
pub const STATUS_OK: i32 = 200;

/// Status used when no better status code could be resolved
pub const STATUS_INTERNAL_ERR: i32 = 500;

/// Request and response metadata
pub type Header = BTreeMap<String, String>;

/// Errors raised by a transport while sending a message
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The caller cancelled the invocation before the call completed
    #[error("transport call cancelled")]
    Cancelled,

    /// The remote service could not be reached or the exchange broke down
    #[error("transport call failed")]
    Failed(#[source] BoxError),
}

impl TransportError {
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }
}

/// Outgoing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: Option<String>,
    pub header: Header,
    pub body: Vec<u8>,
}

/// Collects the status, header and body reported by a transport.
///
/// A writer that is never touched reports [`STATUS_OK`] with an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseWriter {
    status: i32,
    header: Header,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: STATUS_OK,
            header: Header::new(),
            body: Vec::new(),
        }
    }

    /// Sets the response status code
    pub fn header_status(&mut self, status: i32) {
        self.status = status;
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sends a single message to a remote service.
///
/// Implementations are expected to honour `cancel`; the executor imposes no
/// deadline of its own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        cancel: &CancellationToken,
        writer: &mut ResponseWriter,
        request: &Request,
        store: &dyn Store,
    ) -> Result<(), TransportError>;
}
