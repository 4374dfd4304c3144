//! askdb - ask your database questions in plain language over a WebSocket.
//!
//! This library exposes the core modules for use in integration tests.

pub mod broker;
pub mod catalog;
pub mod cli;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod logging;
pub mod query;
pub mod validate;
