//! Core trait abstractions for storage and page transport.

pub mod store;
pub mod transport;
