use tpmrm::ResourceManagerConfig;
use tpmrm_protocol::codes::*;
use tpmrm_protocol::{error_response, flush_target};
use tpmrm_tests::harness::fake_tpm::FakeTpm;
use tpmrm_tests::harness::{load_object, manager, manager_with, provoke, wire};

#[test]
fn load_then_sign_uses_actual_handle() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);

    let virtual_handle = load_object(&mut rm);
    assert!(is_transient_handle(virtual_handle));
    assert!((0x8080_0000..=0x80FF_FFFF).contains(&virtual_handle));
    let actual = *tpm.state().objects.keys().next().unwrap();
    assert_ne!(actual, virtual_handle);

    let response = rm.send_command(&wire::sign(virtual_handle));
    assert_eq!(tpm.last_command().handles, vec![actual]);
    // Sign has no output handles, so the device's bytes come back untouched.
    assert_eq!(response, tpmrm_protocol::encode_response(TPM_RC_SUCCESS, &[], &[], &1u32.to_be_bytes()));
}

#[test]
fn flushed_virtual_handle_is_rejected_locally() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    let virtual_handle = load_object(&mut rm);
    let actual = *tpm.state().objects.keys().next().unwrap();

    assert_eq!(rm.send_command(&wire::flush(virtual_handle)), wire::success());
    assert_eq!(flush_target(&tpm.last_command()).unwrap(), actual);
    assert!(rm.objects().is_empty());
    assert!(rm.objects().virtual_for_actual(actual).is_none());

    let sent = tpm.commands_sent();
    assert_eq!(rm.send_command(&wire::sign(virtual_handle)), wire::bad_handle());
    assert_eq!(tpm.commands_sent(), sent);
}

#[test]
fn flushing_the_actual_handle_is_rejected() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    load_object(&mut rm);
    let actual = *tpm.state().objects.keys().next().unwrap();

    assert_eq!(rm.send_command(&wire::flush(actual)), wire::bad_handle());
    assert!(tpm.is_object_loaded(actual));
    assert_eq!(rm.objects().len(), 1);
}

#[test]
fn evicted_objects_resolve_to_their_own_reloaded_key() {
    let tpm = FakeTpm::with_slots(2, 3);
    let mut rm = manager(&tpm);

    // Five keys through two slots: every third load evicts the others.
    let handles: Vec<Handle> = (0..5).map(|_| load_object(&mut rm)).collect();
    assert_eq!(rm.objects().len(), 5);
    assert!(tpm.state().objects.len() <= 2);

    for round in 0..2 {
        for (i, &virtual_handle) in handles.iter().enumerate() {
            let response = rm.send_command(&wire::sign(virtual_handle));
            let identity = wire::parameters_of(&response, 0);
            assert_eq!(identity, &(i as u32 + 1).to_be_bytes(), "round {round} key {i}");
            let actual = rm.objects().lookup(virtual_handle).unwrap().actual_handle().unwrap();
            assert!(tpm.is_object_loaded(actual));
        }
    }
}

#[test]
fn evicted_object_reloads_before_use() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    let virtual_handle = load_object(&mut rm);
    provoke(&mut rm, &tpm, TPM_RC_OBJECT_MEMORY);
    assert!(!rm.objects().lookup(virtual_handle).unwrap().is_loaded());
    assert!(tpm.state().objects.is_empty());

    let mark = tpm.commands_sent();
    let response = rm.send_command(&wire::sign(virtual_handle));
    assert_eq!(wire::code(&response), TPM_RC_SUCCESS);
    let codes: Vec<CommandCode> = tpm.commands_after(mark).iter().map(|c| c.code).collect();
    assert_eq!(codes, vec![TPM_CC_CONTEXT_LOAD, TPM_CC_SIGN]);
}

#[test]
fn flushing_an_evicted_object_needs_no_device_round_trip() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    let virtual_handle = load_object(&mut rm);
    provoke(&mut rm, &tpm, TPM_RC_OBJECT_MEMORY);

    let mark = tpm.commands_sent();
    assert_eq!(rm.send_command(&wire::flush(virtual_handle)), wire::success());
    assert_eq!(tpm.commands_sent(), mark);
    assert!(rm.objects().is_empty());
}

#[test]
fn unknown_handles_leave_tables_untouched() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    load_object(&mut rm);
    rm.send_command(&wire::start_session());
    let before = (rm.objects().clone(), rm.sessions().clone(), rm.bridge().clone());
    let sent = tpm.commands_sent();

    assert_eq!(rm.send_command(&wire::flush(0x8080_1234)), wire::bad_handle());
    assert_eq!(rm.send_command(&wire::flush(HMAC_SESSION_FIRST + 99)), wire::bad_handle());
    assert_eq!(rm.send_command(&wire::sign(0x8080_1234)), wire::bad_handle());

    assert_eq!(tpm.commands_sent(), sent);
    assert_eq!(
        (rm.objects().clone(), rm.sessions().clone(), rm.bridge().clone()),
        before
    );
}

#[test]
fn object_capacity_flushes_the_untracked_object() {
    let tpm = FakeTpm::with_slots(8, 3);
    let config = ResourceManagerConfig {
        virtual_handle_first: 0x8080_0000,
        virtual_handle_last: 0x8080_0001,
        ..ResourceManagerConfig::default()
    };
    let mut rm = manager_with(&tpm, config);
    load_object(&mut rm);
    load_object(&mut rm);

    let response = rm.send_command(&wire::load());
    assert_eq!(response, error_response(RM_TPM_ERROR_BASE | TPM_RC_OBJECT_HANDLES));
    assert_eq!(tpm.last_command().code, TPM_CC_FLUSH_CONTEXT);
    assert_eq!(tpm.state().objects.len(), 2);
    assert_eq!(rm.objects().len(), 2);
}

#[test]
fn persistent_handles_pass_through_unchanged() {
    let tpm = FakeTpm::new();
    let mut rm = manager(&tpm);
    rm.send_command(&wire::load());
    assert_eq!(tpm.last_command().handles, vec![PERSISTENT_FIRST]);
}

#[test]
fn refused_loads_do_not_shift_key_identities() {
    let tpm = FakeTpm::with_slots(1, 3);
    let config = ResourceManagerConfig {
        max_command_attempts: 1,
        ..ResourceManagerConfig::default()
    };
    let mut rm = manager_with(&tpm, config);
    let first = load_object(&mut rm);

    let refused = rm.send_command(&wire::load());
    assert_eq!(refused, error_response(TPM_RC_OBJECT_MEMORY));
    assert_eq!(rm.send_command(&wire::flush(first)), wire::success());

    let second = load_object(&mut rm);
    let response = rm.send_command(&wire::sign(second));
    assert_eq!(wire::parameters_of(&response, 0), &2u32.to_be_bytes());
}
