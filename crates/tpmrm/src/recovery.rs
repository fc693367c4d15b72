//! Warning remediation: eviction, un-gapping and session flushing, with a
//! retry loop bounded per command and per warning code.

use std::collections::HashSet;

use tpmrm_protocol::codes::{
    CommandCode, Handle, RM_RC_MALFORMED_RESPONSE, ResponseCode, TPM_CC_CONTEXT_LOAD,
    TPM_CC_CONTEXT_SAVE, TPM_CC_FLUSH_CONTEXT, TPM_RC_CONTEXT_GAP, TPM_RC_MEMORY,
    TPM_RC_OBJECT_HANDLES, TPM_RC_OBJECT_MEMORY, TPM_RC_SESSION_HANDLES, TPM_RC_SESSION_MEMORY,
    TPM_RC_SUCCESS,
};
use tpmrm_protocol::{MessageInfo, commands, parse_response, response_code};
use tracing::{debug, info, warn};

use crate::Hex;
use crate::manager::ResourceManager;
use crate::transceiver::Transceiver;

/// What to do about an actionable warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Reload and re-save every saved session to refresh its context counter.
    UnGap,
    /// Save and flush every loaded object the command does not need.
    EvictObjects,
    /// Save the least recently used loaded session the command does not need.
    EvictSession,
    EvictObjectsAndSession,
    /// Flush the least recently used session the command does not need.
    FlushSession,
}

impl Remediation {
    pub fn for_warning(code: ResponseCode) -> Option<Self> {
        match code {
            TPM_RC_CONTEXT_GAP => Some(Self::UnGap),
            TPM_RC_OBJECT_MEMORY | TPM_RC_OBJECT_HANDLES => Some(Self::EvictObjects),
            TPM_RC_SESSION_MEMORY => Some(Self::EvictSession),
            TPM_RC_MEMORY => Some(Self::EvictObjectsAndSession),
            TPM_RC_SESSION_HANDLES => Some(Self::FlushSession),
            _ => None,
        }
    }
}

/// Warnings already remediated while serving the current caller command.
#[derive(Debug, Default)]
pub(crate) struct Episode {
    attempted: HashSet<ResponseCode>,
}

impl Episode {
    pub(crate) fn reset(&mut self) {
        self.attempted.clear();
    }

    /// Returns false if `code` was already claimed in this episode.
    pub(crate) fn claim(&mut self, code: ResponseCode) -> bool {
        self.attempted.insert(code)
    }
}

impl<T: Transceiver> ResourceManager<T> {
    /// Sends `command`, remediating warnings and resending the same bytes up
    /// to the configured number of attempts. `required` lists handles that
    /// must not be evicted. Returns the last response.
    pub(crate) fn send_with_remediation(
        &mut self,
        command: &[u8],
        required: &HashSet<Handle>,
    ) -> Vec<u8> {
        let attempts = self.config.max_command_attempts;
        let mut attempt = 1;
        loop {
            let response = self.downstream.send_and_wait(command);
            let Ok(code) = response_code(&response) else {
                return response;
            };
            if Remediation::for_warning(code).is_none() || attempt >= attempts {
                return response;
            }
            if !self.fix_warning(code, required) {
                return response;
            }
            attempt += 1;
            debug!(code = %Hex(code), attempt, "retrying after remediation");
        }
    }

    fn fix_warning(&mut self, code: ResponseCode, required: &HashSet<Handle>) -> bool {
        let Some(remediation) = Remediation::for_warning(code) else {
            return false;
        };
        if !self.episode.claim(code) {
            warn!(code = %Hex(code), "warning already remediated for this command");
            return false;
        }
        info!(code = %Hex(code), ?remediation, "remediating warning");
        match remediation {
            Remediation::UnGap => self.fix_context_gap(required),
            Remediation::EvictObjects => {
                self.evict_objects(required);
                true
            }
            Remediation::EvictSession => {
                self.evict_session(required);
                true
            }
            Remediation::EvictObjectsAndSession => {
                self.evict_objects(required);
                self.evict_session(required);
                true
            }
            Remediation::FlushSession => self.flush_session(required),
        }
    }

    fn evict_objects(&mut self, required: &HashSet<Handle>) {
        for (virtual_handle, _) in self.objects.loaded() {
            if required.contains(&virtual_handle) {
                continue;
            }
            // An earlier nested remediation may already have moved it.
            let Some(actual) = self
                .objects
                .lookup(virtual_handle)
                .ok()
                .and_then(|info| info.actual_handle())
            else {
                continue;
            };
            let pinned = pin(required, virtual_handle);
            let context = match self.save_context(actual, &pinned) {
                Ok(context) => context,
                Err(code) => {
                    warn!(handle = %Hex(virtual_handle), code = %Hex(code), "failed to save object");
                    continue;
                }
            };
            if let Err(code) = self.flush_handle(actual, &pinned) {
                warn!(handle = %Hex(virtual_handle), code = %Hex(code), "failed to flush object");
                continue;
            }
            self.objects.mark_saved(virtual_handle, context);
            debug!(handle = %Hex(virtual_handle), actual = %Hex(actual), "evicted object");
        }
    }

    fn evict_session(&mut self, required: &HashSet<Handle>) {
        let Some(session) = self.sessions.lru_loaded(required) else {
            debug!("no session eligible for eviction");
            return;
        };
        match self.save_context(session, &pin(required, session)) {
            Ok(context) => {
                self.sessions.mark_saved(session, context);
                debug!(session = %Hex(session), "evicted session");
            }
            Err(code) => {
                warn!(session = %Hex(session), code = %Hex(code), "failed to save session");
            }
        }
    }

    fn flush_session(&mut self, required: &HashSet<Handle>) -> bool {
        let Some(session) = self.sessions.lru_tracked(required) else {
            debug!("no session eligible for flushing");
            return true;
        };
        match self.flush_handle(session, &pin(required, session)) {
            Ok(()) => {
                self.forget_session(session);
                info!(session = %Hex(session), "flushed session to free a handle");
                true
            }
            Err(code) => {
                warn!(session = %Hex(session), code = %Hex(code), "failed to flush session");
                false
            }
        }
    }

    /// Reloads and re-saves every saved session, oldest first, so the device
    /// hands out fresh context counters. Stops at the first failure.
    fn fix_context_gap(&mut self, required: &HashSet<Handle>) -> bool {
        for (session, old_context) in self.sessions.saved_by_creation() {
            let pinned = pin(required, session);
            let loaded = match self.load_context(&old_context, &pinned) {
                Ok(loaded) => loaded,
                Err(code) => {
                    warn!(session = %Hex(session), code = %Hex(code), "un-gap failed to load session");
                    return false;
                }
            };
            let new_context = match self.save_context(loaded, &pinned) {
                Ok(context) => context,
                Err(code) => {
                    let now = self.tick();
                    self.sessions.mark_loaded(session, now);
                    warn!(session = %Hex(session), code = %Hex(code), "un-gap failed to save session");
                    return false;
                }
            };
            self.bridge.remap(&old_context, &new_context);
            self.sessions.mark_saved(session, new_context);
            debug!(session = %Hex(session), "un-gapped session");
        }
        true
    }

    fn device_call(
        &mut self,
        command: &[u8],
        code: CommandCode,
        required: &HashSet<Handle>,
    ) -> Result<MessageInfo, ResponseCode> {
        let response = self.send_with_remediation(command, required);
        let reply = parse_response(&response, code).map_err(|e| {
            warn!(command = %Hex(code), error = %e, "malformed response to internal command");
            RM_RC_MALFORMED_RESPONSE
        })?;
        if reply.code != TPM_RC_SUCCESS {
            return Err(reply.code);
        }
        Ok(reply)
    }

    pub(crate) fn save_context(
        &mut self,
        actual: Handle,
        required: &HashSet<Handle>,
    ) -> Result<Vec<u8>, ResponseCode> {
        let reply = self.device_call(&commands::context_save(actual), TPM_CC_CONTEXT_SAVE, required)?;
        Ok(reply.parameter_data)
    }

    /// Loads a saved context and returns the handle the device assigned.
    pub(crate) fn load_context(
        &mut self,
        context: &[u8],
        required: &HashSet<Handle>,
    ) -> Result<Handle, ResponseCode> {
        let reply = self.device_call(&commands::context_load(context), TPM_CC_CONTEXT_LOAD, required)?;
        reply.handles.first().copied().ok_or(RM_RC_MALFORMED_RESPONSE)
    }

    pub(crate) fn flush_handle(
        &mut self,
        actual: Handle,
        required: &HashSet<Handle>,
    ) -> Result<(), ResponseCode> {
        self.device_call(&commands::flush_context(actual), TPM_CC_FLUSH_CONTEXT, required)?;
        Ok(())
    }
}

fn pin(required: &HashSet<Handle>, handle: Handle) -> HashSet<Handle> {
    let mut pinned = required.clone();
    pinned.insert(handle);
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_actionable_warnings() {
        assert_eq!(Remediation::for_warning(TPM_RC_CONTEXT_GAP), Some(Remediation::UnGap));
        assert_eq!(
            Remediation::for_warning(TPM_RC_OBJECT_HANDLES),
            Some(Remediation::EvictObjects)
        );
        assert_eq!(
            Remediation::for_warning(TPM_RC_MEMORY),
            Some(Remediation::EvictObjectsAndSession)
        );
        assert_eq!(
            Remediation::for_warning(TPM_RC_SESSION_HANDLES),
            Some(Remediation::FlushSession)
        );
        assert_eq!(Remediation::for_warning(TPM_RC_SUCCESS), None);
        assert_eq!(Remediation::for_warning(0x922), None);
    }

    #[test]
    fn episode_claims_each_warning_once() {
        let mut episode = Episode::default();
        assert!(episode.claim(TPM_RC_MEMORY));
        assert!(!episode.claim(TPM_RC_MEMORY));
        assert!(episode.claim(TPM_RC_CONTEXT_GAP));
        episode.reset();
        assert!(episode.claim(TPM_RC_MEMORY));
    }
}
