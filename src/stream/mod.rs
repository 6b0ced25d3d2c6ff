//! Producer / consumer streaming of decoded features
//!
//! The decoder runs on a producer thread and inserts each root-level entity
//! into a bounded [`RingBuffer`]; the caller drains it through a
//! [`FeatureReader`].

pub mod buffer;
pub mod reader;

pub use buffer::{RingBuffer, StreamState};
pub use reader::FeatureReader;
