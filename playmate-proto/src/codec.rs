//! JSON text-frame codec for relay events.
//!
//! One WebSocket text frame carries exactly one event. The relay encodes a
//! broadcast once and hands the same frame to every recipient.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::event::{ClientEvent, ServerEvent};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The event could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
    /// The frame is not valid JSON or does not match a known event.
    #[error("deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ClientEvent {}
    impl Sealed for super::ServerEvent {}
}

/// Marker for the two event vocabularies that may cross the wire.
pub trait WireEvent: Serialize + DeserializeOwned + sealed::Sealed {}

impl WireEvent for ClientEvent {}
impl WireEvent for ServerEvent {}

/// Encodes an event into a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the event cannot be serialized.
pub fn encode<E: WireEvent>(event: &E) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(CodecError::Serialization)
}

/// Decodes an event from a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the text is not valid JSON or
/// does not describe an event of type `E`.
pub fn decode<E: WireEvent>(text: &str) -> Result<E, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Deserialization)
}
