//! Deterministic logic shared by the session controller.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return outputs suitable for tests.

pub mod budget;
pub mod content;
pub mod error;
pub mod identifier;
pub mod types;
