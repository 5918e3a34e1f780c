//! Byte buffer helpers shared by the caption encoder crates.
//!
//! The main type is [`ChunkedBuffer`], an ordered list of owned byte chunks
//! that lets every framing layer prepend its header (and append its trailer)
//! without copying the payload that was already assembled below it.

mod chunked;

pub use chunked::{ChunkedBuffer, Chunks};
