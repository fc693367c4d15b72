//! TPM 2.0 constants used by the resource manager and the handle-count table
//! that tells the codec how many handle slots each command carries.

/// A TPM handle (object, session, NV index, PCR, permanent or persistent).
pub type Handle = u32;
/// A TPM command code.
pub type CommandCode = u32;
/// A TPM response code.
pub type ResponseCode = u32;

// Structure tags
pub const TPM_ST_NO_SESSIONS: u16 = 0x8001;
pub const TPM_ST_SESSIONS: u16 = 0x8002;

/// Size of the fixed `tag | size | code` header.
pub const HEADER_SIZE: usize = 10;
/// Size of one handle slot.
pub const HANDLE_SIZE: usize = 4;

// Handle types (most significant byte of a handle)
pub const HR_SHIFT: u32 = 24;
pub const TPM_HT_PCR: u8 = 0x00;
pub const TPM_HT_NV_INDEX: u8 = 0x01;
pub const TPM_HT_HMAC_SESSION: u8 = 0x02;
pub const TPM_HT_POLICY_SESSION: u8 = 0x03;
pub const TPM_HT_PERMANENT: u8 = 0x40;
pub const TPM_HT_TRANSIENT: u8 = 0x80;
pub const TPM_HT_PERSISTENT: u8 = 0x81;

pub const HMAC_SESSION_FIRST: Handle = (TPM_HT_HMAC_SESSION as u32) << HR_SHIFT;
pub const POLICY_SESSION_FIRST: Handle = (TPM_HT_POLICY_SESSION as u32) << HR_SHIFT;
pub const TRANSIENT_FIRST: Handle = (TPM_HT_TRANSIENT as u32) << HR_SHIFT;
pub const PERSISTENT_FIRST: Handle = (TPM_HT_PERSISTENT as u32) << HR_SHIFT;

/// Password authorization pseudo-session. Never occupies a session slot.
pub const TPM_RS_PW: Handle = 0x4000_0009;
pub const TPM_RH_NULL: Handle = 0x4000_0007;

// Session attributes
pub const SESSION_CONTINUE: u8 = 0x01;

// Startup types
pub const TPM_SU_CLEAR: u16 = 0x0000;
pub const TPM_SU_STATE: u16 = 0x0001;

// Capabilities
pub const TPM_CAP_HANDLES: u32 = 0x0000_0001;

// Response codes
pub const TPM_RC_SUCCESS: ResponseCode = 0x000;

pub const RC_VER1: ResponseCode = 0x100;
pub const TPM_RC_INITIALIZE: ResponseCode = RC_VER1;
pub const TPM_RC_FAILURE: ResponseCode = RC_VER1 + 0x001;

pub const RC_FMT1: ResponseCode = 0x080;
pub const TPM_RC_VALUE: ResponseCode = RC_FMT1 + 0x004;
pub const TPM_RC_HANDLE: ResponseCode = RC_FMT1 + 0x00B;
pub const TPM_RC_SIZE: ResponseCode = RC_FMT1 + 0x015;
pub const TPM_RC_TAG: ResponseCode = RC_FMT1 + 0x017;
/// Parameter-number qualifier bit of a format-one code.
pub const TPM_RC_P: ResponseCode = 0x040;
/// Index 1 for the handle/parameter/session qualifier of a format-one code.
pub const TPM_RC_1: ResponseCode = 0x100;

pub const RC_WARN: ResponseCode = 0x900;
pub const TPM_RC_CONTEXT_GAP: ResponseCode = RC_WARN + 0x001;
pub const TPM_RC_OBJECT_MEMORY: ResponseCode = RC_WARN + 0x002;
pub const TPM_RC_SESSION_MEMORY: ResponseCode = RC_WARN + 0x003;
pub const TPM_RC_MEMORY: ResponseCode = RC_WARN + 0x004;
pub const TPM_RC_SESSION_HANDLES: ResponseCode = RC_WARN + 0x005;
pub const TPM_RC_OBJECT_HANDLES: ResponseCode = RC_WARN + 0x006;
pub const TPM_RC_LOCALITY: ResponseCode = RC_WARN + 0x007;
pub const TPM_RC_YIELDED: ResponseCode = RC_WARN + 0x008;
pub const TPM_RC_CANCELED: ResponseCode = RC_WARN + 0x009;
pub const TPM_RC_TESTING: ResponseCode = RC_WARN + 0x00A;
pub const TPM_RC_RETRY: ResponseCode = RC_WARN + 0x022;

/// Layer for errors the resource manager reports in TPM format.
pub const RM_TPM_ERROR_BASE: ResponseCode = 12 << 16;
/// Layer for errors that originate in the resource manager itself.
pub const RM_ERROR_BASE: ResponseCode = 11 << 16;
pub const RM_RC_MALFORMED_COMMAND: ResponseCode = RM_ERROR_BASE + 0x001;
pub const RM_RC_MALFORMED_RESPONSE: ResponseCode = RM_ERROR_BASE + 0x002;

/// Returns true if `code` is a format-one code carrying `error` as its error
/// number, whatever handle/parameter/session index it names.
pub fn is_format_one_error(code: ResponseCode, error: ResponseCode) -> bool {
    code & RC_FMT1 != 0 && code & 0xFFFF_F0BF == error
}

// Command codes
pub const TPM_CC_NV_UNDEFINE_SPACE_SPECIAL: CommandCode = 0x0000_011F;
pub const TPM_CC_EVICT_CONTROL: CommandCode = 0x0000_0120;
pub const TPM_CC_HIERARCHY_CONTROL: CommandCode = 0x0000_0121;
pub const TPM_CC_NV_UNDEFINE_SPACE: CommandCode = 0x0000_0122;
pub const TPM_CC_CHANGE_EPS: CommandCode = 0x0000_0124;
pub const TPM_CC_CHANGE_PPS: CommandCode = 0x0000_0125;
pub const TPM_CC_CLEAR: CommandCode = 0x0000_0126;
pub const TPM_CC_CLEAR_CONTROL: CommandCode = 0x0000_0127;
pub const TPM_CC_CLOCK_SET: CommandCode = 0x0000_0128;
pub const TPM_CC_HIERARCHY_CHANGE_AUTH: CommandCode = 0x0000_0129;
pub const TPM_CC_NV_DEFINE_SPACE: CommandCode = 0x0000_012A;
pub const TPM_CC_PCR_ALLOCATE: CommandCode = 0x0000_012B;
pub const TPM_CC_PCR_SET_AUTH_POLICY: CommandCode = 0x0000_012C;
pub const TPM_CC_PP_COMMANDS: CommandCode = 0x0000_012D;
pub const TPM_CC_SET_PRIMARY_POLICY: CommandCode = 0x0000_012E;
pub const TPM_CC_FIELD_UPGRADE_START: CommandCode = 0x0000_012F;
pub const TPM_CC_CLOCK_RATE_ADJUST: CommandCode = 0x0000_0130;
pub const TPM_CC_CREATE_PRIMARY: CommandCode = 0x0000_0131;
pub const TPM_CC_NV_GLOBAL_WRITE_LOCK: CommandCode = 0x0000_0132;
pub const TPM_CC_GET_COMMAND_AUDIT_DIGEST: CommandCode = 0x0000_0133;
pub const TPM_CC_NV_INCREMENT: CommandCode = 0x0000_0134;
pub const TPM_CC_NV_SET_BITS: CommandCode = 0x0000_0135;
pub const TPM_CC_NV_EXTEND: CommandCode = 0x0000_0136;
pub const TPM_CC_NV_WRITE: CommandCode = 0x0000_0137;
pub const TPM_CC_NV_WRITE_LOCK: CommandCode = 0x0000_0138;
pub const TPM_CC_DICTIONARY_ATTACK_LOCK_RESET: CommandCode = 0x0000_0139;
pub const TPM_CC_DICTIONARY_ATTACK_PARAMETERS: CommandCode = 0x0000_013A;
pub const TPM_CC_NV_CHANGE_AUTH: CommandCode = 0x0000_013B;
pub const TPM_CC_PCR_EVENT: CommandCode = 0x0000_013C;
pub const TPM_CC_PCR_RESET: CommandCode = 0x0000_013D;
pub const TPM_CC_SEQUENCE_COMPLETE: CommandCode = 0x0000_013E;
pub const TPM_CC_SET_ALGORITHM_SET: CommandCode = 0x0000_013F;
pub const TPM_CC_SET_COMMAND_CODE_AUDIT_STATUS: CommandCode = 0x0000_0140;
pub const TPM_CC_FIELD_UPGRADE_DATA: CommandCode = 0x0000_0141;
pub const TPM_CC_INCREMENTAL_SELF_TEST: CommandCode = 0x0000_0142;
pub const TPM_CC_SELF_TEST: CommandCode = 0x0000_0143;
pub const TPM_CC_STARTUP: CommandCode = 0x0000_0144;
pub const TPM_CC_SHUTDOWN: CommandCode = 0x0000_0145;
pub const TPM_CC_STIR_RANDOM: CommandCode = 0x0000_0146;
pub const TPM_CC_ACTIVATE_CREDENTIAL: CommandCode = 0x0000_0147;
pub const TPM_CC_CERTIFY: CommandCode = 0x0000_0148;
pub const TPM_CC_POLICY_NV: CommandCode = 0x0000_0149;
pub const TPM_CC_CERTIFY_CREATION: CommandCode = 0x0000_014A;
pub const TPM_CC_DUPLICATE: CommandCode = 0x0000_014B;
pub const TPM_CC_GET_TIME: CommandCode = 0x0000_014C;
pub const TPM_CC_GET_SESSION_AUDIT_DIGEST: CommandCode = 0x0000_014D;
pub const TPM_CC_NV_READ: CommandCode = 0x0000_014E;
pub const TPM_CC_NV_READ_LOCK: CommandCode = 0x0000_014F;
pub const TPM_CC_OBJECT_CHANGE_AUTH: CommandCode = 0x0000_0150;
pub const TPM_CC_POLICY_SECRET: CommandCode = 0x0000_0151;
pub const TPM_CC_REWRAP: CommandCode = 0x0000_0152;
pub const TPM_CC_CREATE: CommandCode = 0x0000_0153;
pub const TPM_CC_ECDH_ZGEN: CommandCode = 0x0000_0154;
pub const TPM_CC_HMAC: CommandCode = 0x0000_0155;
pub const TPM_CC_IMPORT: CommandCode = 0x0000_0156;
pub const TPM_CC_LOAD: CommandCode = 0x0000_0157;
pub const TPM_CC_QUOTE: CommandCode = 0x0000_0158;
pub const TPM_CC_RSA_DECRYPT: CommandCode = 0x0000_0159;
pub const TPM_CC_HMAC_START: CommandCode = 0x0000_015B;
pub const TPM_CC_SEQUENCE_UPDATE: CommandCode = 0x0000_015C;
pub const TPM_CC_SIGN: CommandCode = 0x0000_015D;
pub const TPM_CC_UNSEAL: CommandCode = 0x0000_015E;
pub const TPM_CC_POLICY_SIGNED: CommandCode = 0x0000_0160;
pub const TPM_CC_CONTEXT_LOAD: CommandCode = 0x0000_0161;
pub const TPM_CC_CONTEXT_SAVE: CommandCode = 0x0000_0162;
pub const TPM_CC_ECDH_KEY_GEN: CommandCode = 0x0000_0163;
pub const TPM_CC_ENCRYPT_DECRYPT: CommandCode = 0x0000_0164;
pub const TPM_CC_FLUSH_CONTEXT: CommandCode = 0x0000_0165;
pub const TPM_CC_LOAD_EXTERNAL: CommandCode = 0x0000_0167;
pub const TPM_CC_MAKE_CREDENTIAL: CommandCode = 0x0000_0168;
pub const TPM_CC_NV_READ_PUBLIC: CommandCode = 0x0000_0169;
pub const TPM_CC_POLICY_AUTHORIZE: CommandCode = 0x0000_016A;
pub const TPM_CC_POLICY_AUTH_VALUE: CommandCode = 0x0000_016B;
pub const TPM_CC_POLICY_COMMAND_CODE: CommandCode = 0x0000_016C;
pub const TPM_CC_POLICY_COUNTER_TIMER: CommandCode = 0x0000_016D;
pub const TPM_CC_POLICY_CP_HASH: CommandCode = 0x0000_016E;
pub const TPM_CC_POLICY_LOCALITY: CommandCode = 0x0000_016F;
pub const TPM_CC_POLICY_NAME_HASH: CommandCode = 0x0000_0170;
pub const TPM_CC_POLICY_OR: CommandCode = 0x0000_0171;
pub const TPM_CC_POLICY_TICKET: CommandCode = 0x0000_0172;
pub const TPM_CC_READ_PUBLIC: CommandCode = 0x0000_0173;
pub const TPM_CC_RSA_ENCRYPT: CommandCode = 0x0000_0174;
pub const TPM_CC_START_AUTH_SESSION: CommandCode = 0x0000_0176;
pub const TPM_CC_VERIFY_SIGNATURE: CommandCode = 0x0000_0177;
pub const TPM_CC_ECC_PARAMETERS: CommandCode = 0x0000_0178;
pub const TPM_CC_FIRMWARE_READ: CommandCode = 0x0000_0179;
pub const TPM_CC_GET_CAPABILITY: CommandCode = 0x0000_017A;
pub const TPM_CC_GET_RANDOM: CommandCode = 0x0000_017B;
pub const TPM_CC_GET_TEST_RESULT: CommandCode = 0x0000_017C;
pub const TPM_CC_HASH: CommandCode = 0x0000_017D;
pub const TPM_CC_PCR_READ: CommandCode = 0x0000_017E;
pub const TPM_CC_POLICY_PCR: CommandCode = 0x0000_017F;
pub const TPM_CC_POLICY_RESTART: CommandCode = 0x0000_0180;
pub const TPM_CC_READ_CLOCK: CommandCode = 0x0000_0181;
pub const TPM_CC_PCR_EXTEND: CommandCode = 0x0000_0182;
pub const TPM_CC_PCR_SET_AUTH_VALUE: CommandCode = 0x0000_0183;
pub const TPM_CC_NV_CERTIFY: CommandCode = 0x0000_0184;
pub const TPM_CC_EVENT_SEQUENCE_COMPLETE: CommandCode = 0x0000_0185;
pub const TPM_CC_HASH_SEQUENCE_START: CommandCode = 0x0000_0186;
pub const TPM_CC_POLICY_PHYSICAL_PRESENCE: CommandCode = 0x0000_0187;
pub const TPM_CC_POLICY_DUPLICATION_SELECT: CommandCode = 0x0000_0188;
pub const TPM_CC_POLICY_GET_DIGEST: CommandCode = 0x0000_0189;
pub const TPM_CC_TEST_PARMS: CommandCode = 0x0000_018A;
pub const TPM_CC_COMMIT: CommandCode = 0x0000_018B;
pub const TPM_CC_POLICY_PASSWORD: CommandCode = 0x0000_018C;
pub const TPM_CC_ZGEN_2PHASE: CommandCode = 0x0000_018D;
pub const TPM_CC_EC_EPHEMERAL: CommandCode = 0x0000_018E;
pub const TPM_CC_POLICY_NV_WRITTEN: CommandCode = 0x0000_018F;

/// Number of handle slots in a command, keyed by command code.
const REQUEST_HANDLES: &[(CommandCode, usize)] = &[
    (TPM_CC_NV_UNDEFINE_SPACE_SPECIAL, 2),
    (TPM_CC_EVICT_CONTROL, 2),
    (TPM_CC_HIERARCHY_CONTROL, 1),
    (TPM_CC_NV_UNDEFINE_SPACE, 2),
    (TPM_CC_CHANGE_EPS, 1),
    (TPM_CC_CHANGE_PPS, 1),
    (TPM_CC_CLEAR, 1),
    (TPM_CC_CLEAR_CONTROL, 1),
    (TPM_CC_CLOCK_SET, 1),
    (TPM_CC_HIERARCHY_CHANGE_AUTH, 1),
    (TPM_CC_NV_DEFINE_SPACE, 1),
    (TPM_CC_PCR_ALLOCATE, 1),
    (TPM_CC_PCR_SET_AUTH_POLICY, 2),
    (TPM_CC_PP_COMMANDS, 1),
    (TPM_CC_SET_PRIMARY_POLICY, 1),
    (TPM_CC_FIELD_UPGRADE_START, 2),
    (TPM_CC_CLOCK_RATE_ADJUST, 1),
    (TPM_CC_CREATE_PRIMARY, 1),
    (TPM_CC_NV_GLOBAL_WRITE_LOCK, 1),
    (TPM_CC_GET_COMMAND_AUDIT_DIGEST, 2),
    (TPM_CC_NV_INCREMENT, 2),
    (TPM_CC_NV_SET_BITS, 2),
    (TPM_CC_NV_EXTEND, 2),
    (TPM_CC_NV_WRITE, 2),
    (TPM_CC_NV_WRITE_LOCK, 2),
    (TPM_CC_DICTIONARY_ATTACK_LOCK_RESET, 1),
    (TPM_CC_DICTIONARY_ATTACK_PARAMETERS, 1),
    (TPM_CC_NV_CHANGE_AUTH, 1),
    (TPM_CC_PCR_EVENT, 1),
    (TPM_CC_PCR_RESET, 1),
    (TPM_CC_SEQUENCE_COMPLETE, 1),
    (TPM_CC_SET_ALGORITHM_SET, 1),
    (TPM_CC_SET_COMMAND_CODE_AUDIT_STATUS, 1),
    (TPM_CC_FIELD_UPGRADE_DATA, 0),
    (TPM_CC_INCREMENTAL_SELF_TEST, 0),
    (TPM_CC_SELF_TEST, 0),
    (TPM_CC_STARTUP, 0),
    (TPM_CC_SHUTDOWN, 0),
    (TPM_CC_STIR_RANDOM, 0),
    (TPM_CC_ACTIVATE_CREDENTIAL, 2),
    (TPM_CC_CERTIFY, 2),
    (TPM_CC_POLICY_NV, 3),
    (TPM_CC_CERTIFY_CREATION, 2),
    (TPM_CC_DUPLICATE, 2),
    (TPM_CC_GET_TIME, 2),
    (TPM_CC_GET_SESSION_AUDIT_DIGEST, 3),
    (TPM_CC_NV_READ, 2),
    (TPM_CC_NV_READ_LOCK, 2),
    (TPM_CC_OBJECT_CHANGE_AUTH, 2),
    (TPM_CC_POLICY_SECRET, 2),
    (TPM_CC_REWRAP, 2),
    (TPM_CC_CREATE, 1),
    (TPM_CC_ECDH_ZGEN, 1),
    (TPM_CC_HMAC, 1),
    (TPM_CC_IMPORT, 1),
    (TPM_CC_LOAD, 1),
    (TPM_CC_QUOTE, 1),
    (TPM_CC_RSA_DECRYPT, 1),
    (TPM_CC_HMAC_START, 1),
    (TPM_CC_SEQUENCE_UPDATE, 1),
    (TPM_CC_SIGN, 1),
    (TPM_CC_UNSEAL, 1),
    (TPM_CC_POLICY_SIGNED, 2),
    (TPM_CC_CONTEXT_LOAD, 0),
    (TPM_CC_CONTEXT_SAVE, 1),
    (TPM_CC_ECDH_KEY_GEN, 1),
    (TPM_CC_ENCRYPT_DECRYPT, 1),
    (TPM_CC_FLUSH_CONTEXT, 0),
    (TPM_CC_LOAD_EXTERNAL, 0),
    (TPM_CC_MAKE_CREDENTIAL, 1),
    (TPM_CC_NV_READ_PUBLIC, 1),
    (TPM_CC_POLICY_AUTHORIZE, 1),
    (TPM_CC_POLICY_AUTH_VALUE, 1),
    (TPM_CC_POLICY_COMMAND_CODE, 1),
    (TPM_CC_POLICY_COUNTER_TIMER, 1),
    (TPM_CC_POLICY_CP_HASH, 1),
    (TPM_CC_POLICY_LOCALITY, 1),
    (TPM_CC_POLICY_NAME_HASH, 1),
    (TPM_CC_POLICY_OR, 1),
    (TPM_CC_POLICY_TICKET, 1),
    (TPM_CC_READ_PUBLIC, 1),
    (TPM_CC_RSA_ENCRYPT, 1),
    (TPM_CC_START_AUTH_SESSION, 2),
    (TPM_CC_VERIFY_SIGNATURE, 1),
    (TPM_CC_ECC_PARAMETERS, 0),
    (TPM_CC_FIRMWARE_READ, 0),
    (TPM_CC_GET_CAPABILITY, 0),
    (TPM_CC_GET_RANDOM, 0),
    (TPM_CC_GET_TEST_RESULT, 0),
    (TPM_CC_HASH, 0),
    (TPM_CC_PCR_READ, 0),
    (TPM_CC_POLICY_PCR, 1),
    (TPM_CC_POLICY_RESTART, 1),
    (TPM_CC_READ_CLOCK, 0),
    (TPM_CC_PCR_EXTEND, 1),
    (TPM_CC_PCR_SET_AUTH_VALUE, 1),
    (TPM_CC_NV_CERTIFY, 3),
    (TPM_CC_EVENT_SEQUENCE_COMPLETE, 2),
    (TPM_CC_HASH_SEQUENCE_START, 0),
    (TPM_CC_POLICY_PHYSICAL_PRESENCE, 1),
    (TPM_CC_POLICY_DUPLICATION_SELECT, 1),
    (TPM_CC_POLICY_GET_DIGEST, 1),
    (TPM_CC_TEST_PARMS, 0),
    (TPM_CC_COMMIT, 1),
    (TPM_CC_POLICY_PASSWORD, 1),
    (TPM_CC_ZGEN_2PHASE, 1),
    (TPM_CC_EC_EPHEMERAL, 0),
    (TPM_CC_POLICY_NV_WRITTEN, 1),
];

/// Commands whose successful response carries a handle.
const RESPONSE_HANDLES: &[(CommandCode, usize)] = &[
    (TPM_CC_CREATE_PRIMARY, 1),
    (TPM_CC_LOAD, 1),
    (TPM_CC_HMAC_START, 1),
    (TPM_CC_CONTEXT_LOAD, 1),
    (TPM_CC_LOAD_EXTERNAL, 1),
    (TPM_CC_START_AUTH_SESSION, 1),
    (TPM_CC_HASH_SEQUENCE_START, 1),
];

/// Number of handle slots a command with this code carries, if the code is known.
pub fn request_handle_count(code: CommandCode) -> Option<usize> {
    REQUEST_HANDLES
        .iter()
        .find(|(cc, _)| *cc == code)
        .map(|(_, count)| *count)
}

/// Number of handles in a successful response to a command with this code.
pub fn response_handle_count(code: CommandCode) -> usize {
    RESPONSE_HANDLES
        .iter()
        .find(|(cc, _)| *cc == code)
        .map(|(_, count)| *count)
        .unwrap_or(0)
}

pub fn handle_type(handle: Handle) -> u8 {
    (handle >> HR_SHIFT) as u8
}

pub fn is_transient_handle(handle: Handle) -> bool {
    handle_type(handle) == TPM_HT_TRANSIENT
}

/// True for HMAC and policy session handles. The password pseudo-session is
/// not a session handle.
pub fn is_session_handle(handle: Handle) -> bool {
    matches!(
        handle_type(handle),
        TPM_HT_HMAC_SESSION | TPM_HT_POLICY_SESSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_counts_follow_command_table() {
        assert_eq!(request_handle_count(TPM_CC_SIGN), Some(1));
        assert_eq!(request_handle_count(TPM_CC_START_AUTH_SESSION), Some(2));
        assert_eq!(request_handle_count(TPM_CC_FLUSH_CONTEXT), Some(0));
        assert_eq!(request_handle_count(TPM_CC_POLICY_NV), Some(3));
        assert_eq!(request_handle_count(0xDEAD_BEEF), None);

        assert_eq!(response_handle_count(TPM_CC_LOAD), 1);
        assert_eq!(response_handle_count(TPM_CC_CONTEXT_LOAD), 1);
        assert_eq!(response_handle_count(TPM_CC_SIGN), 0);
    }

    #[test]
    fn handle_classification() {
        assert!(is_transient_handle(TRANSIENT_FIRST + 25));
        assert!(!is_transient_handle(PERSISTENT_FIRST));
        assert!(is_session_handle(HMAC_SESSION_FIRST));
        assert!(is_session_handle(POLICY_SESSION_FIRST + 3));
        assert!(!is_session_handle(TPM_RS_PW));
        assert!(!is_session_handle(TRANSIENT_FIRST));
    }

    #[test]
    fn format_one_handle_errors_ignore_qualifiers() {
        assert!(is_format_one_error(TPM_RC_HANDLE, TPM_RC_HANDLE));
        assert!(is_format_one_error(
            TPM_RC_HANDLE | TPM_RC_P | TPM_RC_1,
            TPM_RC_HANDLE
        ));
        assert!(!is_format_one_error(TPM_RC_VALUE, TPM_RC_HANDLE));
        assert!(!is_format_one_error(TPM_RC_OBJECT_MEMORY, TPM_RC_HANDLE));
    }
}
