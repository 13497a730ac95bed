//! Cogloop Core - Shared records, ring buffers, and error handling

pub mod error;
pub mod ring;
pub mod types;

pub use error::{Error, Result};
pub use ring::RingBuffer;
pub use types::*;
