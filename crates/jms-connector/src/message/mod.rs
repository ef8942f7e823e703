//! Message model
//!
//! [`JmsMessage`] carries a body, a set of typed properties and the standard
//! header fields. Property reads come in two flavours:
//!
//! - Typed accessors (`int_property`, `float_property`, ...) return a
//!   `Result` that separates a missing property from one that cannot be
//!   converted to the requested type.
//! - Legacy accessors (`*_or_default`) never fail. A read that does not
//!   succeed is logged and replaced by the type's zero value, so a genuine
//!   zero and a failed read are indistinguishable to the caller.

pub mod property;

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::{debug, error};

use crate::error::PropertyError;

pub use property::PropertyValue;

/// Message payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MessageBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Map(BTreeMap<String, PropertyValue>),
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Empty => "empty",
            MessageBody::Text(_) => "text",
            MessageBody::Bytes(_) => "bytes",
            MessageBody::Map(_) => "map",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Persistent,
    NonPersistent,
}

/// Standard header fields
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeaders {
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub delivery_mode: DeliveryMode,
    /// 0 (lowest) to 9 (highest)
    pub priority: u8,
    /// Milliseconds since the epoch, set by the client on send
    pub timestamp: Option<i64>,
    pub message_type: Option<String>,
    pub redelivered: bool,
}

impl Default for MessageHeaders {
    fn default() -> Self {
        Self {
            message_id: None,
            correlation_id: None,
            reply_to: None,
            delivery_mode: DeliveryMode::Persistent,
            priority: 4,
            timestamp: None,
            message_type: None,
            redelivered: false,
        }
    }
}

/// A broker message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JmsMessage {
    headers: MessageHeaders,
    properties: BTreeMap<String, PropertyValue>,
    body: MessageBody,
}

impl JmsMessage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::with_body(MessageBody::Text(content.into()))
    }

    pub fn bytes(content: impl Into<Bytes>) -> Self {
        Self::with_body(MessageBody::Bytes(content.into()))
    }

    pub fn map(entries: BTreeMap<String, PropertyValue>) -> Self {
        Self::with_body(MessageBody::Map(entries))
    }

    pub fn with_body(body: MessageBody) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut MessageHeaders {
        &mut self.headers
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.headers.correlation_id = Some(id.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Result<&PropertyValue, PropertyError> {
        self.properties
            .get(name)
            .ok_or_else(|| PropertyError::Missing(name.to_string()))
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn clear_properties(&mut self) {
        self.properties.clear();
    }

    pub fn bool_property(&self, name: &str) -> Result<bool, PropertyError> {
        self.property(name)?.to_bool(name)
    }

    pub fn byte_property(&self, name: &str) -> Result<i8, PropertyError> {
        self.property(name)?.to_byte(name)
    }

    pub fn short_property(&self, name: &str) -> Result<i16, PropertyError> {
        self.property(name)?.to_short(name)
    }

    pub fn int_property(&self, name: &str) -> Result<i32, PropertyError> {
        self.property(name)?.to_int(name)
    }

    pub fn long_property(&self, name: &str) -> Result<i64, PropertyError> {
        self.property(name)?.to_long(name)
    }

    pub fn float_property(&self, name: &str) -> Result<f32, PropertyError> {
        self.property(name)?.to_float(name)
    }

    pub fn double_property(&self, name: &str) -> Result<f64, PropertyError> {
        self.property(name)?.to_double(name)
    }

    pub fn string_property(&self, name: &str) -> Result<String, PropertyError> {
        Ok(self.property(name)?.to_string())
    }

    pub fn text_content(&self) -> Result<&str, PropertyError> {
        match &self.body {
            MessageBody::Text(text) => Ok(text),
            other => Err(PropertyError::WrongBodyType {
                expected: "text",
                actual: other.kind(),
            }),
        }
    }

    pub fn bytes_content(&self) -> Result<&Bytes, PropertyError> {
        match &self.body {
            MessageBody::Bytes(bytes) => Ok(bytes),
            other => Err(PropertyError::WrongBodyType {
                expected: "bytes",
                actual: other.kind(),
            }),
        }
    }

    // Legacy accessors: failures are logged and masked by a zero value.

    pub fn bool_property_or_default(&self, name: &str) -> bool {
        or_default("boolean", name, self.bool_property(name))
    }

    pub fn int_property_or_default(&self, name: &str) -> i32 {
        or_default("int", name, self.int_property(name))
    }

    pub fn long_property_or_default(&self, name: &str) -> i64 {
        or_default("long", name, self.long_property(name))
    }

    pub fn float_property_or_default(&self, name: &str) -> f32 {
        or_default("float", name, self.float_property(name))
    }

    pub fn double_property_or_default(&self, name: &str) -> f64 {
        or_default("double", name, self.double_property(name))
    }

    pub fn string_property_or_default(&self, name: &str) -> String {
        or_default("string", name, self.string_property(name))
    }

    pub fn text_content_or_default(&self) -> String {
        or_default("text", "content", self.text_content().map(str::to_string))
    }

    pub fn bytes_content_or_default(&self) -> Bytes {
        or_default("bytes", "content", self.bytes_content().cloned())
    }
}

fn or_default<T: Default + std::fmt::Debug>(
    kind: &str,
    name: &str,
    read: Result<T, PropertyError>,
) -> T {
    match read {
        Ok(value) => {
            debug!("Get {} property {} from message with value: {:?}", kind, name, value);
            value
        }
        Err(e) => {
            error!("Error when retrieving the {} property {}: {}", kind, name, e);
            T::default()
        }
    }
}
