use std::fmt;
use std::io;

use bulkstream_frame::FrameError;
use bulkstream_pipeline::PipelineError;
use bulkstream_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// A requested self-test did not pass.
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidCapture(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::PayloadTooLarge { .. } | FrameError::StatusLength { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Transport(err) => transport_error(context, err),
        PipelineError::NoSlotsArmed { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_capture_maps_to_data_invalid() {
        let err = transport_error(
            "read capture",
            TransportError::InvalidCapture("missing BSCP signature".to_string()),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("read capture: "));
    }

    #[test]
    fn missing_file_maps_to_failure() {
        let err = transport_error(
            "open capture",
            TransportError::Io(io::Error::new(io::ErrorKind::NotFound, "gone")),
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn unarmed_pipeline_is_a_transport_error() {
        let err = pipeline_error("start", PipelineError::NoSlotsArmed { requested: 12 });
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("12 requested"));
    }

    #[test]
    fn nested_transport_errors_keep_their_mapping() {
        let err = pipeline_error(
            "start",
            PipelineError::Transport(TransportError::Submit("limit".to_string())),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn bad_synth_sizes_are_usage_errors() {
        let err = frame_error(
            "encode",
            FrameError::StatusLength {
                len: 8,
                min: 16,
                max: 192,
            },
        );
        assert_eq!(err.code, USAGE);
    }
}
