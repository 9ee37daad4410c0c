/// Errors that can stop a pipeline or session.
///
/// Per-buffer problems (rejections, ring drops, retired slots) are counted,
/// never returned as errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] bulkstream_transport::TransportError),

    /// Not a single read could be queued at start.
    #[error("no transfer slot could be armed ({requested} requested)")]
    NoSlotsArmed { requested: usize },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
