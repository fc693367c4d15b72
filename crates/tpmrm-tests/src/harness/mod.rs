pub mod fake_tpm;
pub mod wire;

use tpmrm::{ResourceManager, ResourceManagerConfig};
use tpmrm_protocol::codes::{Handle, TPM_RC_SUCCESS};

use fake_tpm::FakeTpm;

/// A manager with default configuration in front of `tpm`.
pub fn manager(tpm: &FakeTpm) -> ResourceManager<FakeTpm> {
    init_tracing();
    ResourceManager::new(tpm.clone())
}

pub fn manager_with(tpm: &FakeTpm, config: ResourceManagerConfig) -> ResourceManager<FakeTpm> {
    init_tracing();
    ResourceManager::with_config(tpm.clone(), config).unwrap()
}

/// Loads a key and returns its virtual handle.
pub fn load_object(rm: &mut ResourceManager<FakeTpm>) -> Handle {
    wire::handle_of(&rm.send_command(&wire::load()))
}

pub fn start_session(rm: &mut ResourceManager<FakeTpm>) -> Handle {
    wire::handle_of(&rm.send_command(&wire::start_session()))
}

/// Makes the next unrelated command hit `warning` once, so the manager
/// remediates it, and checks that the retry succeeded.
pub fn provoke(rm: &mut ResourceManager<FakeTpm>, tpm: &FakeTpm, warning: u32) {
    tpm.inject(tpmrm_protocol::codes::TPM_CC_GET_RANDOM, warning);
    let response = rm.send_command(&wire::get_random());
    assert_eq!(wire::code(&response), TPM_RC_SUCCESS);
}

/// Initialize tracing for tests (only once per process).
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tpmrm=debug")),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}
