//! Common library for the clipstream application
//!
//! This crate provides shared infrastructure used by the clipstream
//! services: database connectivity and error handling.

pub mod database;
pub mod error;
