use tpmrm_protocol::codes::{
    HMAC_SESSION_FIRST, Handle, POLICY_SESSION_FIRST, TPM_CC_GET_CAPABILITY, TPM_CC_SELF_TEST,
    TPM_CC_STARTUP, TPM_RC_INITIALIZE, TPM_RC_SUCCESS, TPM_SU_CLEAR, TRANSIENT_FIRST,
    handle_type,
};
use tpmrm_protocol::{HandleList, commands, parse_response, response_code};
use tracing::{debug, error, info, warn};

use crate::Hex;
use crate::error::InitError;
use crate::manager::ResourceManager;
use crate::transceiver::Transceiver;

impl<T: Transceiver> ResourceManager<T> {
    /// Starts the device and flushes every transient object and session it
    /// holds, so that the empty tables match the device.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        if !self.downstream.init() {
            error!("downstream transceiver failed to initialize");
            return Err(InitError::Transport);
        }
        self.episode.reset();

        let code = self.device_code(&commands::startup(TPM_SU_CLEAR), TPM_CC_STARTUP)?;
        if code != TPM_RC_SUCCESS && code != TPM_RC_INITIALIZE {
            error!(code = %Hex(code), "TPM startup failed");
            return Err(InitError::Startup(code));
        }
        let code = self.device_code(&commands::self_test(true), TPM_CC_SELF_TEST)?;
        if code != TPM_RC_SUCCESS {
            error!(code = %Hex(code), "TPM self test failed");
            return Err(InitError::SelfTest(code));
        }

        let mut flushed = 0usize;
        for first in [TRANSIENT_FIRST, HMAC_SESSION_FIRST, POLICY_SESSION_FIRST] {
            for handle in self.list_handles(first)? {
                let response = self.downstream.send_and_wait(&commands::flush_context(handle));
                match response_code(&response) {
                    Ok(TPM_RC_SUCCESS) => flushed += 1,
                    Ok(code) => warn!(handle = %Hex(handle), code = %Hex(code), "failed to flush stale handle"),
                    Err(e) => warn!(handle = %Hex(handle), error = %e, "malformed flush response"),
                }
            }
        }
        info!(flushed, "resource manager initialized");
        Ok(())
    }

    fn device_code(&mut self, command: &[u8], code: u32) -> Result<u32, InitError> {
        let response = self.downstream.send_and_wait(command);
        Ok(parse_response(&response, code)?.code)
    }

    /// Every handle of `first`'s type the device reports, paging through the
    /// capability in batches.
    fn list_handles(&mut self, first: Handle) -> Result<Vec<Handle>, InitError> {
        let batch = self.config.capability_batch;
        let mut handles = Vec::new();
        let mut property = first;
        loop {
            let response = self
                .downstream
                .send_and_wait(&commands::get_handles(property, batch));
            let reply = parse_response(&response, TPM_CC_GET_CAPABILITY)?;
            if reply.code != TPM_RC_SUCCESS {
                error!(code = %Hex(reply.code), "handle enumeration failed");
                return Err(InitError::Capability(reply.code));
            }
            let list = HandleList::decode(&reply.parameter_data)?;
            let page: Vec<Handle> = list
                .handles
                .into_iter()
                .filter(|&h| h >= property && handle_type(h) == handle_type(first))
                .collect();
            let Some(&last) = page.last() else {
                break;
            };
            debug!(first = %Hex(first), count = page.len(), "enumerated handles");
            handles.extend(page);
            if !list.more_data || last == Handle::MAX {
                break;
            }
            property = last + 1;
        }
        Ok(handles)
    }
}
