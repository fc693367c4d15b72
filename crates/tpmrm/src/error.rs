use thiserror::Error;
use tpmrm_protocol::ParseError;
use tpmrm_protocol::codes::{
    Handle, RM_RC_MALFORMED_RESPONSE, RM_TPM_ERROR_BASE, ResponseCode, TPM_RC_HANDLE,
    TPM_RC_OBJECT_HANDLES, TPM_RC_SESSION_HANDLES,
};

/// A command referenced a handle the resource manager cannot serve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("unknown handle {0:#010x}")]
    Unknown(Handle),

    #[error("reloading context of {handle:#010x} failed with {code:#x}")]
    LoadFailed { handle: Handle, code: ResponseCode },

    #[error("no free virtual object handle")]
    ObjectCapacity,

    #[error("session capacity exhausted")]
    SessionCapacity,
}

impl HandleError {
    pub fn to_response_code(&self) -> ResponseCode {
        match self {
            HandleError::Unknown(_) => RM_TPM_ERROR_BASE | TPM_RC_HANDLE,
            HandleError::LoadFailed { code, .. } => *code,
            HandleError::ObjectCapacity => RM_TPM_ERROR_BASE | TPM_RC_OBJECT_HANDLES,
            HandleError::SessionCapacity => RM_TPM_ERROR_BASE | TPM_RC_SESSION_HANDLES,
        }
    }
}

/// Why a single command could not be forwarded or its response translated.
/// Every variant becomes a header-only error response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("malformed response: {0}")]
    MalformedResponse(ParseError),
}

impl CommandError {
    pub(crate) fn to_response_code(&self) -> ResponseCode {
        match self {
            CommandError::Parse(e) => e.to_response_code(),
            CommandError::Handle(e) => e.to_response_code(),
            CommandError::MalformedResponse(_) => RM_RC_MALFORMED_RESPONSE,
        }
    }
}

/// The device could not be brought into a known state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("transport initialization failed")]
    Transport,

    #[error("startup failed with {0:#x}")]
    Startup(ResponseCode),

    #[error("self test failed with {0:#x}")]
    SelfTest(ResponseCode),

    #[error("handle enumeration failed with {0:#x}")]
    Capability(ResponseCode),

    #[error("malformed device response: {0}")]
    MalformedResponse(#[from] ParseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("request queue is full")]
    QueueFull,

    #[error("worker has shut down")]
    QueueClosed,

    #[error("worker dropped the request")]
    WorkerGone,

    #[error("callback delivery requires a tokio runtime")]
    NoRuntime,

    #[error("resource manager initialization failed")]
    InitFailed,

    #[error("queue depth must be positive")]
    ZeroQueueDepth,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
