//! Library crate for quizlive-back, exposing modules for binaries and integration tests.

/// Configuration loaded at startup.
pub mod config;
/// Session snapshot persistence.
pub mod dao;
/// Request, response and event payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Operations behind the routes.
pub mod services;
/// Session core and shared application state.
pub mod state;
