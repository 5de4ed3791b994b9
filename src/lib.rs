//! Library crate for phase-puzzle-back, exposing modules for binaries and integration tests.

/// Runtime configuration loaded from disk.
pub mod config;
/// Persistence gateway, its backends and storage rows.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Session, player and streaming services.
pub mod services;
/// Shared state and the puzzle domain model.
pub mod state;
