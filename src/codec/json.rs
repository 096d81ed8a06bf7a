//! JSON codec
//!
//! Objects are flattened into dotted property paths when decoding
//! (`{"meta":{"message":"x"}}` is stored at `meta.message`) and rebuilt from the
//! schema paths when encoding.

use super::{Codec, CodecConstructor, CodecError, Schema};
use crate::store::{Reference, Store};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Constructs [`JsonCodec`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConstructor;

impl CodecConstructor for JsonConstructor {
    fn name(&self) -> &str {
        "json"
    }

    fn new(&self, resource: &str, schema: Option<Schema>) -> Result<Arc<dyn Codec>, CodecError> {
        Ok(Arc::new(JsonCodec::new(resource, schema)))
    }
}

/// JSON codec bound to a resource
#[derive(Debug, Clone)]
pub struct JsonCodec {
    resource: String,
    schema: Option<Schema>,
}

impl JsonCodec {
    /// Creates a codec; without a schema every decoded property is stored
    pub fn new(resource: impl Into<String>, schema: Option<Schema>) -> Self {
        Self {
            resource: resource.into(),
            schema,
        }
    }
}

impl Codec for JsonCodec {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn marshal(&self, store: &dyn Store) -> Result<Vec<u8>, CodecError> {
        let mut root = Map::new();

        if let Some(schema) = &self.schema {
            for path in &schema.properties {
                match store.load(&self.resource, path) {
                    Some(reference) => insert_path(&mut root, path, reference.value),
                    None if schema.required.contains(path) => {
                        return Err(CodecError::MissingProperty {
                            resource: self.resource.clone(),
                            path: path.clone(),
                        })
                    }
                    None => {}
                }
            }
        }

        Ok(serde_json::to_vec(&Value::Object(root))?)
    }

    fn unmarshal(&self, body: &[u8], store: &dyn Store) -> Result<(), CodecError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let Value::Object(root) = serde_json::from_slice(body)? else {
            return Err(CodecError::NotAnObject {
                resource: self.resource.clone(),
            });
        };

        let mut leaves = Vec::new();
        for (key, value) in root {
            flatten(key, value, &mut leaves);
        }

        for (path, value) in leaves {
            let covered = self
                .schema
                .as_ref()
                .map_or(true, |schema| schema.covers(&path));

            if covered {
                store.store(&self.resource, Reference::new(path, value));
            }
        }

        Ok(())
    }
}

fn flatten(path: String, value: Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten(format!("{path}.{key}"), nested, out);
            }
        }
        other => out.push((path, other)),
    }
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }

        let Some(map) = entry.as_object_mut() else {
            return;
        };
        current = map;
    }
}
