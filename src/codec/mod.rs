//! Codec contract
//!
//! A codec encodes a request body from the reference store and decodes a
//! response (or error) body back into it. Codecs are bound to a resource and an
//! optional schema when they are constructed; the executor only ever calls
//! `marshal` and `unmarshal`.

use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod json;

pub use json::{JsonCodec, JsonConstructor};

/// Errors raised while encoding or decoding a body
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The body is not valid for the codec's format
    #[error("malformed body")]
    Malformed(#[from] serde_json::Error),

    /// The body decoded to something other than an object
    #[error("body for resource '{resource}' is not an object")]
    NotAnObject { resource: String },

    /// A property required by the schema is missing from the store
    #[error("required property '{path}' missing in resource '{resource}'")]
    MissingProperty { resource: String, path: String },
}

/// Property paths a codec reads or writes.
///
/// Paths are dotted (`meta.message`). A path naming an object covers every
/// property nested below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            properties: properties.into_iter().map(Into::into).collect(),
            required: Vec::new(),
        }
    }

    /// Marks paths that must be present when marshalling
    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the schema covers `path`
    pub fn covers(&self, path: &str) -> bool {
        self.properties.iter().any(|property| {
            path == property
                || path
                    .strip_prefix(property.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Encoder/decoder bound to a resource and schema
pub trait Codec: Send + Sync {
    /// Resource the codec reads from and writes into
    fn resource(&self) -> &str;

    /// Encodes a body from the values held in the store
    fn marshal(&self, store: &dyn Store) -> Result<Vec<u8>, CodecError>;

    /// Decodes `body` into the store
    fn unmarshal(&self, body: &[u8], store: &dyn Store) -> Result<(), CodecError>;
}

/// Builds codecs of one format
pub trait CodecConstructor: Send + Sync {
    /// Name of the format, e.g. `json`
    fn name(&self) -> &str;

    /// Constructs a codec bound to `resource` and `schema`
    fn new(&self, resource: &str, schema: Option<Schema>) -> Result<Arc<dyn Codec>, CodecError>;
}
