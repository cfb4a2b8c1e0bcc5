//! Shared test utilities for integration tests.
//!
//! This module provides:
//! - Kafka testcontainer setup
//! - A mock connector with connect-time failure injection

#![allow(dead_code)]

pub mod containers;
pub mod mock_broker;

#[allow(unused_imports)]
pub use containers::*;
#[allow(unused_imports)]
pub use mock_broker::*;
