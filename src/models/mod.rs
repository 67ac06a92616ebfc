//! Data models for the file gateway.
//!
//! The gateway is stateless: these types describe request/response shapes
//! derived from the store, not persisted records.

pub mod file;
