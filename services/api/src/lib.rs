//! services/api/src/lib.rs
//!
//! Library surface of the API service. The binaries in `src/bin` pull the
//! adapters, study flows and web layer from here.

pub mod adapters;
pub mod config;
pub mod error;
pub mod study;
pub mod web;

#[cfg(test)]
pub(crate) mod test_support;
