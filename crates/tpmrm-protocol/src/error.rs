use thiserror::Error;

use crate::codes::{CommandCode, RM_RC_MALFORMED_COMMAND, ResponseCode};

/// Reasons a command or response buffer could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("message truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid structure tag {0:#06x}")]
    BadTag(u16),

    #[error("declared size {declared} does not match buffer length {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    #[error("command {code:#010x} expects {expected} handles, only {available} present")]
    MissingHandles {
        code: CommandCode,
        expected: usize,
        available: usize,
    },

    #[error("authorization area is malformed: {0}")]
    MalformedAuthorization(&'static str),

    #[error("parameter area is malformed: {0}")]
    MalformedParameters(&'static str),

    #[error("handle index {0} is outside the handle area")]
    HandleIndex(usize),
}

impl ParseError {
    /// Response code reported to a caller whose command failed to parse.
    pub fn to_response_code(&self) -> ResponseCode {
        RM_RC_MALFORMED_COMMAND
    }
}
