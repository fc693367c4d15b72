use crate::codes::{
    CommandCode, HANDLE_SIZE, HEADER_SIZE, Handle, ResponseCode, SESSION_CONTINUE,
    TPM_RC_SUCCESS, TPM_RS_PW, TPM_ST_NO_SESSIONS, TPM_ST_SESSIONS, request_handle_count,
    response_handle_count,
};
use crate::error::ParseError;
use crate::reader::{Reader, put_sized};

/// A parsed command or response.
///
/// `code` is the command code for commands and the response code for
/// responses. Responses never carry session handles; their
/// `session_continued` flags line up with the command's authorization blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageInfo {
    pub has_sessions: bool,
    pub code: u32,
    pub handles: Vec<Handle>,
    pub session_handles: Vec<Handle>,
    pub session_continued: Vec<bool>,
    pub parameter_data: Vec<u8>,
    /// Byte offset of `parameter_data` within the original buffer.
    pub parameter_offset: usize,
}

/// One authorization block, used to encode commands and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthBlock {
    /// Session handle. Not encoded in responses.
    pub handle: Handle,
    pub nonce: Vec<u8>,
    pub attributes: u8,
    pub hmac: Vec<u8>,
}

impl AuthBlock {
    pub fn new(handle: Handle, continue_session: bool) -> Self {
        Self {
            handle,
            nonce: Vec::new(),
            attributes: if continue_session { SESSION_CONTINUE } else { 0 },
            hmac: Vec::new(),
        }
    }

    /// Password authorization with an empty password.
    pub fn password() -> Self {
        Self::new(TPM_RS_PW, false)
    }

    pub fn with_nonce(mut self, nonce: Vec<u8>) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_hmac(mut self, hmac: Vec<u8>) -> Self {
        self.hmac = hmac;
        self
    }

    pub fn continue_session(&self) -> bool {
        self.attributes & SESSION_CONTINUE != 0
    }

    fn encode_into(&self, out: &mut Vec<u8>, with_handle: bool) {
        if with_handle {
            out.extend_from_slice(&self.handle.to_be_bytes());
        }
        put_sized(out, &self.nonce);
        out.push(self.attributes);
        put_sized(out, &self.hmac);
    }
}

fn read_header(r: &mut Reader<'_>, total: usize) -> Result<(u16, u32), ParseError> {
    let tag = r.u16()?;
    if tag != TPM_ST_NO_SESSIONS && tag != TPM_ST_SESSIONS {
        return Err(ParseError::BadTag(tag));
    }
    let size = r.u32()?;
    if size as usize != total {
        return Err(ParseError::SizeMismatch {
            declared: size,
            actual: total,
        });
    }
    let code = r.u32()?;
    Ok((tag, code))
}

fn read_handles(
    r: &mut Reader<'_>,
    code: CommandCode,
    expected: usize,
) -> Result<Vec<Handle>, ParseError> {
    let available = r.remaining() / HANDLE_SIZE;
    if available < expected {
        return Err(ParseError::MissingHandles {
            code,
            expected,
            available,
        });
    }
    (0..expected).map(|_| r.u32()).collect()
}

/// Reads the response code from a header, validating tag and size.
pub fn response_code(response: &[u8]) -> Result<ResponseCode, ParseError> {
    let mut r = Reader::new(response);
    let (_, code) = read_header(&mut r, response.len())?;
    Ok(code)
}

/// Parses a command buffer.
pub fn parse_command(command: &[u8]) -> Result<MessageInfo, ParseError> {
    let mut r = Reader::new(command);
    let (tag, code) = read_header(&mut r, command.len())?;
    let expected = request_handle_count(code).unwrap_or(0);
    let handles = read_handles(&mut r, code, expected)?;

    let mut info = MessageInfo {
        has_sessions: tag == TPM_ST_SESSIONS,
        code,
        handles,
        ..MessageInfo::default()
    };

    if info.has_sessions {
        let auth_size = r.u32()? as usize;
        let area = r.take(auth_size).map_err(|_| {
            ParseError::MalformedAuthorization("authorization size exceeds message")
        })?;
        let mut auth = Reader::new(area);
        while !auth.is_empty() {
            let (handle, attributes) = read_command_auth(&mut auth)
                .map_err(|_| ParseError::MalformedAuthorization("truncated authorization block"))?;
            info.session_handles.push(handle);
            info.session_continued
                .push(attributes & SESSION_CONTINUE != 0);
        }
    }

    info.parameter_offset = r.position();
    info.parameter_data = r.rest().to_vec();
    Ok(info)
}

fn read_command_auth(r: &mut Reader<'_>) -> Result<(Handle, u8), ParseError> {
    let handle = r.u32()?;
    r.sized()?;
    let attributes = r.u8()?;
    r.sized()?;
    Ok((handle, attributes))
}

fn read_response_auth(r: &mut Reader<'_>) -> Result<u8, ParseError> {
    r.sized()?;
    let attributes = r.u8()?;
    r.sized()?;
    Ok(attributes)
}

/// Parses a response to a command with `command_code`.
///
/// Handles are only expected when the response code is success; error
/// responses are header-only and any trailing bytes become parameter data.
pub fn parse_response(
    response: &[u8],
    command_code: CommandCode,
) -> Result<MessageInfo, ParseError> {
    let mut r = Reader::new(response);
    let (tag, code) = read_header(&mut r, response.len())?;

    let mut info = MessageInfo {
        has_sessions: tag == TPM_ST_SESSIONS,
        code,
        ..MessageInfo::default()
    };

    if code != TPM_RC_SUCCESS {
        info.parameter_offset = r.position();
        info.parameter_data = r.rest().to_vec();
        return Ok(info);
    }

    info.handles = read_handles(&mut r, command_code, response_handle_count(command_code))?;

    if info.has_sessions {
        let parameter_size = r.u32()? as usize;
        info.parameter_offset = r.position();
        info.parameter_data = r
            .take(parameter_size)
            .map_err(|_| ParseError::MalformedParameters("parameter size exceeds message"))?
            .to_vec();
        while !r.is_empty() {
            let attributes = read_response_auth(&mut r)
                .map_err(|_| ParseError::MalformedAuthorization("truncated authorization block"))?;
            info.session_continued
                .push(attributes & SESSION_CONTINUE != 0);
        }
    } else {
        info.parameter_offset = r.position();
        info.parameter_data = r.rest().to_vec();
    }

    Ok(info)
}

/// Overwrites handle slot `index` in place. The message length never changes.
pub fn replace_handle(message: &mut [u8], index: usize, handle: Handle) -> Result<(), ParseError> {
    let offset = HEADER_SIZE + index * HANDLE_SIZE;
    let slot = message
        .get_mut(offset..offset + HANDLE_SIZE)
        .ok_or(ParseError::HandleIndex(index))?;
    slot.copy_from_slice(&handle.to_be_bytes());
    Ok(())
}

/// The handle FlushContext targets. It lives in the parameter area, not in a
/// handle slot.
pub fn flush_target(info: &MessageInfo) -> Result<Handle, ParseError> {
    let raw = info
        .parameter_data
        .get(..HANDLE_SIZE)
        .ok_or(ParseError::MalformedParameters("missing flush target"))?;
    Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Rewrites the FlushContext target of `command`, which must be the buffer
/// `info` was parsed from.
pub fn set_flush_target(
    command: &mut [u8],
    info: &MessageInfo,
    handle: Handle,
) -> Result<(), ParseError> {
    let offset = info.parameter_offset;
    let slot = command
        .get_mut(offset..offset + HANDLE_SIZE)
        .ok_or(ParseError::MalformedParameters("missing flush target"))?;
    slot.copy_from_slice(&handle.to_be_bytes());
    Ok(())
}

/// Replaces the whole parameter area of `message` with `parameters` of the
/// same length.
pub fn replace_parameters(
    message: &mut [u8],
    info: &MessageInfo,
    parameters: &[u8],
) -> Result<(), ParseError> {
    if parameters.len() != info.parameter_data.len() {
        return Err(ParseError::MalformedParameters(
            "replacement changes parameter length",
        ));
    }
    let offset = info.parameter_offset;
    let area = message
        .get_mut(offset..offset + parameters.len())
        .ok_or(ParseError::MalformedParameters("parameter area out of bounds"))?;
    area.copy_from_slice(parameters);
    Ok(())
}

fn finish(tag: u16, code: u32, body: Vec<u8>) -> Vec<u8> {
    let size = (HEADER_SIZE + body.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&tag.to_be_bytes());
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&code.to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Encodes a command. The sessions tag is used iff `auth` is non-empty.
pub fn encode_command(
    code: CommandCode,
    handles: &[Handle],
    auth: &[AuthBlock],
    parameters: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    for handle in handles {
        body.extend_from_slice(&handle.to_be_bytes());
    }
    let tag = if auth.is_empty() {
        TPM_ST_NO_SESSIONS
    } else {
        let mut area = Vec::new();
        for block in auth {
            block.encode_into(&mut area, true);
        }
        body.extend_from_slice(&(area.len() as u32).to_be_bytes());
        body.extend_from_slice(&area);
        TPM_ST_SESSIONS
    };
    body.extend_from_slice(parameters);
    finish(tag, code, body)
}

/// Encodes a response. With sessions, the parameter size precedes the
/// parameters and the authorization blocks follow them.
pub fn encode_response(
    code: ResponseCode,
    handles: &[Handle],
    auth: &[AuthBlock],
    parameters: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    for handle in handles {
        body.extend_from_slice(&handle.to_be_bytes());
    }
    let tag = if auth.is_empty() {
        body.extend_from_slice(parameters);
        TPM_ST_NO_SESSIONS
    } else {
        body.extend_from_slice(&(parameters.len() as u32).to_be_bytes());
        body.extend_from_slice(parameters);
        for block in auth {
            block.encode_into(&mut body, false);
        }
        TPM_ST_SESSIONS
    };
    finish(tag, code, body)
}

/// The 10-byte header-only response used for every locally generated error.
pub fn error_response(code: ResponseCode) -> Vec<u8> {
    finish(TPM_ST_NO_SESSIONS, code, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::*;

    fn auth(handle: Handle, continue_session: bool) -> AuthBlock {
        AuthBlock::new(handle, continue_session)
            .with_nonce(vec![b'A'; 32])
            .with_hmac(vec![b'B'; 32])
    }

    #[test]
    fn parses_command_with_handles_sessions_and_parameters() {
        let command = encode_command(
            TPM_CC_START_AUTH_SESSION,
            &[1, 2],
            &[auth(HMAC_SESSION_FIRST, true), AuthBlock::password()],
            b"12345",
        );
        let info = parse_command(&command).unwrap();
        assert!(info.has_sessions);
        assert_eq!(info.code, TPM_CC_START_AUTH_SESSION);
        assert_eq!(info.handles, vec![1, 2]);
        assert_eq!(info.session_handles, vec![HMAC_SESSION_FIRST, TPM_RS_PW]);
        assert_eq!(info.session_continued, vec![true, false]);
        assert_eq!(info.parameter_data, b"12345");
        assert_eq!(&command[info.parameter_offset..], b"12345");
    }

    #[test]
    fn parses_response_with_parameter_size_before_auth() {
        let response = encode_response(
            TPM_RC_SUCCESS,
            &[HMAC_SESSION_FIRST + 4],
            &[auth(0, false)],
            b"params",
        );
        let info = parse_response(&response, TPM_CC_START_AUTH_SESSION).unwrap();
        assert_eq!(info.handles, vec![HMAC_SESSION_FIRST + 4]);
        assert_eq!(info.parameter_data, b"params");
        assert_eq!(info.session_continued, vec![false]);
        assert!(info.session_handles.is_empty());
    }

    #[test]
    fn error_responses_carry_no_handles() {
        let response = error_response(TPM_RC_OBJECT_MEMORY);
        assert_eq!(response.len(), 10);
        let info = parse_response(&response, TPM_CC_LOAD).unwrap();
        assert_eq!(info.code, TPM_RC_OBJECT_MEMORY);
        assert!(info.handles.is_empty());
        assert_eq!(response_code(&response).unwrap(), TPM_RC_OBJECT_MEMORY);
    }

    #[test]
    fn rejects_bad_tag_and_size() {
        let mut command = encode_command(TPM_CC_STARTUP, &[], &[], &[0, 0]);
        command[1] = 0x03;
        assert_eq!(parse_command(&command), Err(ParseError::BadTag(0x8003)));

        let mut command = encode_command(TPM_CC_STARTUP, &[], &[], &[0, 0]);
        command.push(0);
        assert!(matches!(
            parse_command(&command),
            Err(ParseError::SizeMismatch { declared: 12, actual: 13 })
        ));
    }

    #[test]
    fn rejects_missing_handles() {
        let command = encode_command(TPM_CC_SIGN, &[], &[], &[]);
        assert_eq!(
            parse_command(&command),
            Err(ParseError::MissingHandles {
                code: TPM_CC_SIGN,
                expected: 1,
                available: 0
            })
        );
    }

    #[test]
    fn rejects_truncated_authorization_area() {
        let mut command = encode_command(TPM_CC_STARTUP, &[], &[auth(HMAC_SESSION_FIRST, true)], &[]);
        // Claim one byte more than the authorization area holds.
        let auth_size = u32::from_be_bytes([command[10], command[11], command[12], command[13]]);
        command[10..14].copy_from_slice(&(auth_size + 1).to_be_bytes());
        assert!(matches!(
            parse_command(&command),
            Err(ParseError::MalformedAuthorization(_))
        ));

        let mut command = encode_command(TPM_CC_STARTUP, &[], &[auth(HMAC_SESSION_FIRST, true)], &[]);
        command[10..14].copy_from_slice(&5u32.to_be_bytes());
        assert!(matches!(
            parse_command(&command),
            Err(ParseError::MalformedAuthorization(_))
        ));
    }

    #[test]
    fn rewrites_handles_in_place() {
        let mut command = encode_command(TPM_CC_SIGN, &[TRANSIENT_FIRST + 0x80_0000], &[], b"x");
        let len = command.len();
        replace_handle(&mut command, 0, TRANSIENT_FIRST + 1).unwrap();
        assert_eq!(command.len(), len);
        assert_eq!(parse_command(&command).unwrap().handles, vec![TRANSIENT_FIRST + 1]);
        assert_eq!(
            replace_handle(&mut command, 5, 0),
            Err(ParseError::HandleIndex(5))
        );
    }

    #[test]
    fn flush_target_lives_in_parameters() {
        let mut command = encode_command(
            TPM_CC_FLUSH_CONTEXT,
            &[],
            &[],
            &(TRANSIENT_FIRST + 7).to_be_bytes(),
        );
        let info = parse_command(&command).unwrap();
        assert!(info.handles.is_empty());
        assert_eq!(flush_target(&info).unwrap(), TRANSIENT_FIRST + 7);

        set_flush_target(&mut command, &info, TRANSIENT_FIRST + 2).unwrap();
        let info = parse_command(&command).unwrap();
        assert_eq!(flush_target(&info).unwrap(), TRANSIENT_FIRST + 2);

        let empty = parse_command(&encode_command(TPM_CC_FLUSH_CONTEXT, &[], &[], &[])).unwrap();
        assert!(flush_target(&empty).is_err());
    }

    #[test]
    fn parameter_replacement_preserves_length() {
        let mut command = encode_command(TPM_CC_CONTEXT_LOAD, &[], &[], b"abcd");
        let info = parse_command(&command).unwrap();
        replace_parameters(&mut command, &info, b"wxyz").unwrap();
        assert_eq!(parse_command(&command).unwrap().parameter_data, b"wxyz");
        assert!(replace_parameters(&mut command, &info, b"longer").is_err());
    }
}
