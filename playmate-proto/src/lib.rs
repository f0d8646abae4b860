//! Shared wire vocabulary for the `PlayMate` realtime relay.
//!
//! Clients and the relay exchange JSON text frames of the form
//! `{"event": "<name>", "data": <payload>}`. This crate defines the closed
//! set of events, their payload shapes, structured room identifiers, and the
//! codec that turns them into frames.

pub mod codec;
pub mod connection;
pub mod event;
pub mod room;
