//! Common utilities for Veles.
//!
//! This crate provides foundational types used across all Veles crates:
//!
//! - [`ByteSource`] - Seekable byte access consumed by the database decoders
//! - [`MemorySource`] / [`MmapSource`] - In-memory and memory-mapped sources
//! - [`GameVersion`] - Client build numbers with parsing and ordering

mod error;
mod source;
mod version;

pub use error::{Error, Result};
pub use source::{ByteSource, MemorySource, MmapSource};
pub use version::GameVersion;
