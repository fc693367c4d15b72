//! Truncated, extended and corrupted messages in both directions must come
//! back as ordinary responses, never panics.

use std::sync::{Arc, Mutex};

use tpmrm::{ResourceManager, Transceiver};
use tpmrm_protocol::codes::*;
use tpmrm_protocol::{AuthBlock, encode_command, encode_response, response_code};
use tpmrm_tests::harness::fake_tpm::FakeTpm;
use tpmrm_tests::harness::{init_tracing, load_object, manager, start_session, wire};

/// Answers every command with whatever response is currently set.
#[derive(Clone, Default)]
struct Canned {
    response: Arc<Mutex<Vec<u8>>>,
}

impl Canned {
    fn set(&self, response: Vec<u8>) {
        *self.response.lock().unwrap() = response;
    }
}

impl Transceiver for Canned {
    fn send_and_wait(&mut self, _command: &[u8]) -> Vec<u8> {
        self.response.lock().unwrap().clone()
    }
}

fn variants(message: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for len in 0..message.len() {
        out.push(message[..len].to_vec());
    }
    for extra in 1..=8 {
        let mut longer = message.to_vec();
        longer.extend(std::iter::repeat_n(0xA5, extra));
        out.push(longer);
    }
    for index in 0..message.len() {
        for value in 0..=u8::MAX {
            if value == message[index] {
                continue;
            }
            let mut corrupted = message.to_vec();
            corrupted[index] = value;
            out.push(corrupted);
        }
    }
    out
}

fn assert_is_response(response: &[u8]) {
    assert!(response.len() >= HEADER_SIZE, "short response {response:02x?}");
    assert!(response_code(response).is_ok(), "unparsable response {response:02x?}");
}

#[test]
fn corrupted_commands_are_answered() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    let key = load_object(&mut rm);
    let session = start_session(&mut rm);

    let commands = [
        wire::sign(key),
        wire::use_session(session, true),
        encode_command(
            TPM_CC_SIGN,
            &[key],
            &[wire::command_auth(session, true), AuthBlock::password()],
            &[1, 2, 3, 4],
        ),
        wire::flush(key),
    ];
    for command in commands {
        for variant in variants(&command) {
            assert_is_response(&rm.send_command(&variant));
        }
    }
}

#[test]
fn truncated_command_is_rejected_locally() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    let command = wire::use_session(HMAC_SESSION_FIRST, true);

    let response = rm.send_command(&command[..command.len() - 1]);
    assert_eq!(wire::code(&response), RM_RC_MALFORMED_COMMAND);
    assert_eq!(tpm.commands_sent(), 0);
}

#[test]
fn corrupted_responses_are_answered() {
    init_tracing();
    let device = Canned::default();
    let mut rm = ResourceManager::new(device.clone());

    device.set(encode_response(TPM_RC_SUCCESS, &[TRANSIENT_FIRST], &[], &[]));
    let key = wire::handle_of(&rm.send_command(&wire::load()));
    device.set(encode_response(TPM_RC_SUCCESS, &[HMAC_SESSION_FIRST], &[], &[]));
    let session = wire::handle_of(&rm.send_command(&wire::start_session()));

    let exchanges = [
        (
            wire::load(),
            encode_response(TPM_RC_SUCCESS, &[TRANSIENT_FIRST + 1], &[], &[9; 6]),
        ),
        (
            wire::use_session(session, true),
            encode_response(TPM_RC_SUCCESS, &[], &[wire::response_auth(true)], &[0, 2, 7, 7]),
        ),
        (wire::sign(key), encode_response(TPM_RC_SUCCESS, &[], &[], &[1; 8])),
    ];
    for (command, response) in exchanges {
        for variant in variants(&response) {
            device.set(variant);
            assert_is_response(&rm.send_command(&command));
        }
    }
}

#[test]
fn truncated_response_is_reported_as_malformed() {
    init_tracing();
    let device = Canned::default();
    let mut rm = ResourceManager::new(device.clone());

    let full = encode_response(TPM_RC_SUCCESS, &[TRANSIENT_FIRST], &[], &[]);
    device.set(full[..full.len() - 2].to_vec());
    let response = rm.send_command(&wire::load());
    assert_eq!(wire::code(&response), RM_RC_MALFORMED_RESPONSE);
    assert!(rm.objects().is_empty());
}
