//! Deterministic, pure logic shared by the runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and byte buffers and return deterministic outputs suitable for tests.

pub mod cache_paths;
pub mod demux;
pub mod plan;
pub mod script;
pub mod tokens;
pub mod types;
