//! Host-side receiver for framed two-channel sample streams.
//!
//! A peripheral streams fixed-header frames over a USB bulk-IN endpoint,
//! alternating between two ADC channels and interleaving occasional status
//! records. This crate re-exports the layers that receive them.
//!
//! # Crate Structure
//!
//! - [`transport`]: read-queue abstraction, scripted transport, capture files
//! - [`frame`]: CRC, header and status decoding, per-channel frame rings
//! - [`pipeline`]: the transfer pipeline, stream health tracking and the session loop

/// Re-export transport types.
pub mod transport {
    pub use bulkstream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bulkstream_frame::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use bulkstream_pipeline::*;
}
