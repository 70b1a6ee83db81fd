//! Ordered merging of free-form field maps.
//!
//! Metadata, attributes, and logs are assembled from several optional
//! sources. Each source is a layer; layers are applied in order and a key in
//! a later layer replaces the same key from an earlier one. Merging is
//! shallow: nested objects are replaced, not combined.

use serde::Serialize;
use serde_json::Value;

use crate::types::Fields;

/// Merge `layers` in order, later keys overriding earlier ones.
pub fn merge_layers<'a, I>(layers: I) -> Fields
where
    I: IntoIterator<Item = &'a Fields>,
{
    layers
        .into_iter()
        .fold(Fields::new(), |mut merged, layer| {
            merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        })
}

/// Convert any serializable value into a field map.
///
/// Non-object values produce an empty map.
pub fn to_fields(value: impl Serialize) -> Fields {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Fields::new(),
    }
}

/// Incremental builder applying the same precedence as [`merge_layers`].
#[derive(Debug, Clone, Default)]
pub struct FieldsBuilder {
    fields: Fields,
}

impl FieldsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a whole layer on top of what is already there.
    pub fn layer(mut self, layer: &Fields) -> Self {
        self.fields
            .extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Insert only when a value is present.
    pub fn insert_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.insert(key, v),
            None => self,
        }
    }

    pub fn build(self) -> Fields {
        self.fields
    }
}
