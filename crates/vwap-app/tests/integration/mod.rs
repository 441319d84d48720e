//! Integration tests for ws-vwap.
//!
//! These tests verify the interaction between components:
//! - WebSocket connection lifecycle
//! - Payload flow from the socket into the VWAP windows

pub mod common;
