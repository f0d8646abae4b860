//! `PlayMate` realtime relay library.
//!
//! Exposes the relay for use in tests and for embedding in the application
//! process. The relay accepts WebSocket connections, tracks which rooms each
//! connection has joined, and fans named events out to room members.

pub mod config;
pub mod hub;
pub mod publish;
pub mod relay;
