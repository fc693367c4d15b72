//! TPM 2.0 command/response envelope codec.
//!
//! Parsing never panics: every malformed field becomes a [`ParseError`].

pub mod capability;
pub mod codes;
pub mod commands;
pub mod context;
mod error;
pub mod message;
mod reader;

pub use capability::{HandleList, HandleQuery};
pub use context::SavedContext;
pub use error::ParseError;
pub use message::{
    AuthBlock, MessageInfo, encode_command, encode_response, error_response, flush_target,
    parse_command, parse_response, replace_handle, replace_parameters, response_code,
    set_flush_target,
};
