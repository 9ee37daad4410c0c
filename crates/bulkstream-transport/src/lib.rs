//! Bulk-transfer transport abstraction.
//!
//! The receive pipeline never talks to a USB stack directly. It keeps a set
//! of read buffers queued on a [`Transport`] and collects them back as
//! [`Completion`]s. Implementations provided here:
//! - [`MemoryTransport`]: scripted packets and failures, used by tests and
//!   by offline replay
//! - capture files ([`capture`]): raw transfers recorded one record per
//!   completed read
//!
//! Device discovery, interface claiming and endpoint selection belong to
//! whoever constructs the transport.

pub mod capture;
pub mod error;
pub mod memory;
pub mod traits;

pub use capture::{read_capture, write_capture, CAPTURE_MAGIC, CAPTURE_VERSION};
pub use error::{Result, TransportError};
pub use memory::{EndOfScript, MemoryTransport, SentCommand};
pub use traits::{Completion, TransferHandle, TransferStatus, Transport, MAX_COMMAND_PAYLOAD};
