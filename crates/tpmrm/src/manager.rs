use std::collections::HashSet;

use tpmrm_protocol::codes::{
    Handle, TPM_CC_CONTEXT_LOAD, TPM_CC_CONTEXT_SAVE, TPM_CC_FLUSH_CONTEXT, TPM_RC_HANDLE,
    TPM_RC_SUCCESS, TPM_RS_PW, is_format_one_error, is_session_handle, is_transient_handle,
};
use tpmrm_protocol::{
    MessageInfo, encode_response, error_response, flush_target, parse_command, parse_response,
    replace_handle, replace_parameters, response_code, set_flush_target,
};
use tracing::{debug, error, info, warn};

use crate::Hex;
use crate::bridge::ContextBridge;
use crate::config::ResourceManagerConfig;
use crate::error::{CommandError, ConfigError, HandleError};
use crate::handle::Residency;
use crate::objects::ObjectTable;
use crate::recovery::Episode;
use crate::sessions::SessionRegistry;
use crate::transceiver::{ResponseCallback, Transceiver};

/// Sits between callers and a device transport, virtualizing transient
/// object handles and keeping sessions resident on demand.
///
/// Every entry point takes `&mut self` for the whole command pipeline, so a
/// manager must be confined to one thread or guarded by one lock. See
/// [`crate::ResourceManagerService`].
pub struct ResourceManager<T> {
    pub(crate) downstream: T,
    pub(crate) config: ResourceManagerConfig,
    pub(crate) objects: ObjectTable,
    pub(crate) sessions: SessionRegistry,
    pub(crate) bridge: ContextBridge,
    pub(crate) episode: Episode,
    clock: u64,
}

impl<T: Transceiver> ResourceManager<T> {
    pub fn new(downstream: T) -> Self {
        Self::build(downstream, ResourceManagerConfig::default())
    }

    pub fn with_config(downstream: T, config: ResourceManagerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(downstream, config))
    }

    fn build(downstream: T, config: ResourceManagerConfig) -> Self {
        Self {
            objects: ObjectTable::new(config.virtual_handle_first, config.virtual_handle_last),
            sessions: SessionRegistry::new(config.max_tracked_sessions),
            bridge: ContextBridge::new(),
            episode: Episode::default(),
            clock: 0,
            downstream,
            config,
        }
    }

    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn bridge(&self) -> &ContextBridge {
        &self.bridge
    }

    pub fn downstream(&self) -> &T {
        &self.downstream
    }

    pub fn downstream_mut(&mut self) -> &mut T {
        &mut self.downstream
    }

    pub(crate) fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Runs one command through the pipeline and returns the response the
    /// caller should see. Failures are reported as TPM response codes.
    pub fn send_command(&mut self, command: &[u8]) -> Vec<u8> {
        self.episode.reset();
        let info = match parse_command(command) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "rejecting malformed command");
                return error_response(e.to_response_code());
            }
        };
        let result = if info.code == TPM_CC_FLUSH_CONTEXT {
            self.process_flush_context(command, &info)
        } else {
            self.process_command(command, &info)
        };
        result.unwrap_or_else(|e| {
            debug!(command = %Hex(info.code), error = %e, "command failed locally");
            error_response(e.to_response_code())
        })
    }

    fn process_flush_context(
        &mut self,
        command: &[u8],
        info: &MessageInfo,
    ) -> Result<Vec<u8>, CommandError> {
        let target = flush_target(info)?;
        let mut resolved = command.to_vec();

        if is_transient_handle(target) {
            let actual = self.objects.lookup(target)?.actual_handle();
            match actual {
                Some(actual) => set_flush_target(&mut resolved, info, actual)?,
                None => {
                    // Already out of the device; nothing left to flush there.
                    self.objects.cleanup(target);
                    info!(handle = %Hex(target), "flushed evicted object");
                    return Ok(encode_response(TPM_RC_SUCCESS, &[], &[], &[]));
                }
            }
        } else if is_session_handle(target) {
            self.sessions.lookup(target)?;
        }

        let response = self.downstream.send_and_wait(&resolved);
        let code = response_code(&response).map_err(CommandError::MalformedResponse)?;
        if code == TPM_RC_SUCCESS || is_format_one_error(code, TPM_RC_HANDLE) {
            if is_transient_handle(target) {
                self.objects.cleanup(target);
            } else if is_session_handle(target) {
                self.forget_session(target);
            }
            debug!(handle = %Hex(target), code = %Hex(code), "flushed");
        }
        Ok(response)
    }

    fn process_command(
        &mut self,
        command: &[u8],
        info: &MessageInfo,
    ) -> Result<Vec<u8>, CommandError> {
        self.check_tracked(info)?;
        let required = required_handles(info);
        let mut resolved = command.to_vec();

        for (index, &handle) in info.handles.iter().enumerate() {
            if is_transient_handle(handle) {
                let actual = self.resolve_object(handle, &required)?;
                replace_handle(&mut resolved, index, actual)?;
            } else if is_session_handle(handle) {
                self.ensure_session_loaded(handle, &required)?;
            }
        }
        for &session in &info.session_handles {
            if is_session_handle(session) {
                self.ensure_session_loaded(session, &required)?;
            }
        }

        if info.code == TPM_CC_CONTEXT_LOAD {
            let translated = self.bridge.translate_for_load(&info.parameter_data);
            if translated.len() == info.parameter_data.len() {
                replace_parameters(&mut resolved, info, translated)?;
            } else {
                warn!("translated context changes parameter size; forwarding original");
            }
        }

        let response = self.send_with_remediation(&resolved, &required);
        let reply = parse_response(&response, info.code).map_err(|e| {
            warn!(command = %Hex(info.code), error = %e, "malformed response from device");
            CommandError::MalformedResponse(e)
        })?;
        if reply.code != TPM_RC_SUCCESS {
            return Ok(response);
        }
        self.process_success(info, &reply, response, &required)
    }

    /// Rejects references to untracked virtual objects or sessions before any
    /// device traffic or table change happens.
    fn check_tracked(&self, info: &MessageInfo) -> Result<(), HandleError> {
        for &handle in info.handles.iter().chain(&info.session_handles) {
            if is_transient_handle(handle) && !self.objects.contains(handle) {
                return Err(HandleError::Unknown(handle));
            }
            if is_session_handle(handle) && !self.sessions.contains(handle) {
                return Err(HandleError::Unknown(handle));
            }
        }
        Ok(())
    }

    /// Actual handle for a virtual object, reloading it if it was evicted.
    fn resolve_object(
        &mut self,
        virtual_handle: Handle,
        required: &HashSet<Handle>,
    ) -> Result<Handle, HandleError> {
        let now = self.tick();
        let residency = self.objects.lookup(virtual_handle)?.residency.clone();
        let actual = match residency {
            Residency::Loaded(actual) => actual,
            Residency::Saved(context) => {
                let actual = self
                    .load_context(&context, required)
                    .map_err(|code| HandleError::LoadFailed {
                        handle: virtual_handle,
                        code,
                    })?;
                self.objects.mark_loaded(virtual_handle, actual, now);
                debug!(handle = %Hex(virtual_handle), actual = %Hex(actual), "reloaded object");
                actual
            }
        };
        self.objects.touch(virtual_handle, now);
        Ok(actual)
    }

    fn ensure_session_loaded(
        &mut self,
        session: Handle,
        required: &HashSet<Handle>,
    ) -> Result<(), HandleError> {
        if session == TPM_RS_PW {
            return Ok(());
        }
        let now = self.tick();
        let saved = self.sessions.lookup(session)?.saved_context().map(<[u8]>::to_vec);
        if let Some(context) = saved {
            self.load_context(&context, required)
                .map_err(|code| HandleError::LoadFailed {
                    handle: session,
                    code,
                })?;
            self.sessions.mark_loaded(session, now);
            debug!(session = %Hex(session), "reloaded session");
        }
        self.sessions.touch(session, now);
        Ok(())
    }

    fn process_success(
        &mut self,
        info: &MessageInfo,
        reply: &MessageInfo,
        mut response: Vec<u8>,
        required: &HashSet<Handle>,
    ) -> Result<Vec<u8>, CommandError> {
        for (index, &session) in info.session_handles.iter().enumerate() {
            if !is_session_handle(session) {
                continue;
            }
            let continued = info.session_continued[index]
                && reply.session_continued.get(index).copied().unwrap_or(true);
            if !continued {
                self.forget_session(session);
                debug!(session = %Hex(session), "session discontinued");
            }
        }

        if info.code == TPM_CC_CONTEXT_SAVE {
            if let Some(&session) = info.handles.first().filter(|h| is_session_handle(**h)) {
                self.sessions
                    .mark_saved(session, reply.parameter_data.clone());
                self.bridge
                    .on_external_save(session, reply.parameter_data.clone());
            }
        }

        let now = self.tick();
        for (index, &handle) in reply.handles.iter().enumerate() {
            if is_transient_handle(handle) {
                let virtual_handle = match self.objects.register_output(handle, now) {
                    Ok(virtual_handle) => virtual_handle,
                    Err(e) => {
                        self.release_untracked(handle, required);
                        return Err(e.into());
                    }
                };
                replace_handle(&mut response, index, virtual_handle)
                    .map_err(CommandError::MalformedResponse)?;
                debug!(actual = %Hex(handle), handle = %Hex(virtual_handle), "tracking new object");
            } else if is_session_handle(handle) {
                if let Err(e) = self.sessions.record_new(handle, now) {
                    self.release_untracked(handle, required);
                    return Err(e.into());
                }
                debug!(session = %Hex(handle), "tracking session");
            }
        }
        Ok(response)
    }

    /// Flushes a resource the device created but the manager has no room to
    /// track.
    fn release_untracked(&mut self, actual: Handle, required: &HashSet<Handle>) {
        warn!(actual = %Hex(actual), "tracking capacity exhausted; flushing new resource");
        if let Err(code) = self.flush_handle(actual, required) {
            warn!(actual = %Hex(actual), code = %Hex(code), "failed to flush untracked resource");
        }
    }

    pub(crate) fn forget_session(&mut self, session: Handle) {
        self.sessions.discontinue(session);
        self.bridge.remove(session);
    }
}

/// Handles that must stay resident while `info` executes: its virtual object
/// handles and every session it names.
fn required_handles(info: &MessageInfo) -> HashSet<Handle> {
    info.handles
        .iter()
        .chain(&info.session_handles)
        .copied()
        .filter(|&h| is_transient_handle(h) || is_session_handle(h))
        .collect()
}

impl<T: Transceiver> Transceiver for ResourceManager<T> {
    fn send_and_wait(&mut self, command: &[u8]) -> Vec<u8> {
        self.send_command(command)
    }

    fn send(&mut self, command: &[u8], callback: ResponseCallback) {
        let response = self.send_command(command);
        callback(response);
    }

    fn init(&mut self) -> bool {
        match self.initialize() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "resource manager initialization failed");
                false
            }
        }
    }
}
