/// Persistence gateway contract and change-feed types.
pub mod gateway;
/// In-process gateway backend.
pub mod memory;
/// Storage row definitions.
pub mod models;
/// Blob storage for uploaded avatars.
pub mod object_store;
/// PostgREST gateway backend.
#[cfg(feature = "rest-store")]
pub mod rest;
/// Storage error type shared by every backend.
pub mod storage;
/// RFC 3339 timestamp wrapper.
pub mod timestamp;
