//! Fileferry library
//!
//! Minimal TCP file transfer: fixed-frame requests, status + length
//! replies, chunked payload streaming.

pub mod cli;
pub mod error;
pub mod net;
pub mod paths;
pub mod protocol;

pub use error::Error;
