//! Library API for status_probe so tests can exercise the client helpers.

pub mod types;
pub mod ws;
