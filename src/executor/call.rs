//! Call orchestration
//!
//! A [`Caller`] wraps one node's unit of work: request functions, request
//! encoding, the transport exchange, status validation, the error path and the
//! response path. Nodes only see the [`Call`] trait, so tests and embedders can
//! plug in any unit of work.

use super::error::{CallError, CallResult};
use crate::codec::{Codec, CodecConstructor, CodecError, Schema};
use crate::core::Stack;
use crate::store::{Store, ERROR_RESOURCE};
use crate::transport::{Header, Request, ResponseWriter, Transport, TransportError, STATUS_OK};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A unit of work executed by a node, or by its revert
#[async_trait]
pub trait Call: Send + Sync {
    async fn call(&self, cancel: &CancellationToken, store: &dyn Store) -> CallResult;
}

/// Functions and codec of one message direction
#[derive(Clone, Default)]
pub struct Payload {
    pub functions: Stack,
    pub codec: Option<Arc<dyn Codec>>,
    pub header: Header,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions(mut self, functions: Stack) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }
}

/// Configuration of a [`Caller`]
#[derive(Clone, Default)]
pub struct CallerOptions {
    pub transport: Option<Arc<dyn Transport>>,
    pub method: Option<String>,
    pub request: Payload,
    pub response: Payload,
    /// Error path taken when the status is unexpected
    pub error: Payload,
    /// Accepted status codes; empty means `{200}`
    pub expected_status: Vec<i32>,
}

impl CallerOptions {
    /// Decodes unexpected responses into [`ERROR_RESOURCE`] with a codec built
    /// by `constructor`
    pub fn with_error_codec(
        mut self,
        constructor: &dyn CodecConstructor,
        schema: Option<Schema>,
    ) -> Result<Self, CodecError> {
        self.error.codec = Some(constructor.new(ERROR_RESOURCE, schema)?);
        Ok(self)
    }
}

/// Default [`Call`] implementation
pub struct Caller {
    name: String,
    transport: Option<Arc<dyn Transport>>,
    method: Option<String>,
    request: Payload,
    response: Payload,
    error: Payload,
    expected_status: BTreeSet<i32>,
}

impl Caller {
    pub fn new(name: impl Into<String>, options: CallerOptions) -> Self {
        let mut expected_status: BTreeSet<i32> = options.expected_status.into_iter().collect();
        if expected_status.is_empty() {
            expected_status.insert(STATUS_OK);
        }

        Self {
            name: name.into(),
            transport: options.transport,
            method: options.method,
            request: options.request,
            response: options.response,
            error: options.error,
            expected_status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected_status(&self) -> &BTreeSet<i32> {
        &self.expected_status
    }

    fn encode(&self, store: &dyn Store) -> Result<Request, CallError> {
        let body = match &self.request.codec {
            Some(codec) => codec.marshal(store).map_err(CallError::Encode)?,
            None => Vec::new(),
        };

        Ok(Request {
            method: self.method.clone(),
            header: self.request.header.clone(),
            body,
        })
    }

    /// Decodes the error body and runs the error functions; never fails
    fn error_path(&self, writer: &ResponseWriter, store: &dyn Store) {
        if let Some(codec) = &self.error.codec {
            if let Err(err) = codec.unmarshal(writer.body(), store) {
                warn!(call = %self.name, error = %err, "failed to decode error body");
            }
        }

        let failed = self.error.functions.execute_all(store);
        if failed > 0 {
            warn!(call = %self.name, failed, "error functions failed");
        }
    }
}

#[async_trait]
impl Call for Caller {
    async fn call(&self, cancel: &CancellationToken, store: &dyn Store) -> CallResult {
        debug!(call = %self.name, "executing request functions");
        self.request
            .functions
            .execute(store)
            .map_err(CallError::Function)?;

        let request = self.encode(store)?;
        let mut writer = ResponseWriter::new();

        if let Some(transport) = &self.transport {
            if cancel.is_cancelled() {
                debug!(call = %self.name, "invocation cancelled, not sending request");
                return Err(CallError::Transport(TransportError::Cancelled));
            }

            debug!(call = %self.name, method = ?self.method, "sending request");
            transport
                .send(cancel, &mut writer, &request, store)
                .await
                .map_err(CallError::Transport)?;
        }

        let status = writer.status();
        if !self.expected_status.contains(&status) {
            warn!(call = %self.name, status, "unexpected status code, aborting flow");
            self.error_path(&writer, store);
            return Err(CallError::AbortFlow { status });
        }

        if let Some(codec) = &self.response.codec {
            codec
                .unmarshal(writer.body(), store)
                .map_err(CallError::Decode)?;
        }

        debug!(call = %self.name, status, "executing response functions");
        self.response
            .functions
            .execute(store)
            .map_err(CallError::Function)
    }
}
