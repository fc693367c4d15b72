//! A simulated TPM with a few object and session slots.
//!
//! Objects carry an identity that survives save and reload, so tests can
//! tell which object a command really reached: Sign answers with the
//! identity of its key.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tpmrm::Transceiver;
use tpmrm_protocol::codes::*;
use tpmrm_protocol::{
    AuthBlock, HandleList, HandleQuery, MessageInfo, SavedContext, encode_response, error_response,
    flush_target, parse_command,
};
use tracing::trace;

/// Handle in a handle slot is not loaded.
pub const TPM_RC_REFERENCE_H0: ResponseCode = RC_WARN + 0x010;
/// Session in the authorization area is not loaded.
pub const TPM_RC_REFERENCE_S0: ResponseCode = RC_WARN + 0x018;
/// FlushContext of a handle the device does not know.
pub const FLUSH_UNKNOWN: ResponseCode = TPM_RC_HANDLE | TPM_RC_P | TPM_RC_1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Saved {
    Object(u32),
    Session(Handle),
}

#[derive(Debug)]
pub struct DeviceState {
    /// Every command received, in order.
    pub log: Vec<Vec<u8>>,
    pub started: bool,
    pub healthy: bool,
    pub object_slots: usize,
    pub session_slots: usize,
    /// Loaded plus saved sessions the device will track.
    pub max_sessions: usize,
    /// Loaded objects: actual handle to identity.
    pub objects: BTreeMap<Handle, u32>,
    /// Known sessions: handle to whether it is loaded.
    pub sessions: BTreeMap<Handle, bool>,
    saved: HashMap<u64, Saved>,
    next_object: Handle,
    next_session: Handle,
    next_identity: u32,
    sequence: u64,
    injected: VecDeque<(CommandCode, ResponseCode)>,
    failures: HashMap<CommandCode, ResponseCode>,
    scripted: VecDeque<(CommandCode, Vec<u8>)>,
}

impl DeviceState {
    fn new(object_slots: usize, session_slots: usize) -> Self {
        Self {
            log: Vec::new(),
            started: false,
            healthy: true,
            object_slots,
            session_slots,
            max_sessions: 64,
            objects: BTreeMap::new(),
            sessions: BTreeMap::new(),
            saved: HashMap::new(),
            next_object: TRANSIENT_FIRST,
            next_session: HMAC_SESSION_FIRST,
            next_identity: 1,
            sequence: 0,
            injected: VecDeque::new(),
            failures: HashMap::new(),
            scripted: VecDeque::new(),
        }
    }

    pub fn loaded_sessions(&self) -> usize {
        self.sessions.values().filter(|&&loaded| loaded).count()
    }

    fn execute(&mut self, command: &[u8]) -> Vec<u8> {
        self.log.push(command.to_vec());
        let Ok(info) = parse_command(command) else {
            return error_response(TPM_RC_SIZE);
        };
        trace!(code = info.code, "fake tpm command");

        if let Some(index) = self.scripted.iter().position(|(code, _)| *code == info.code) {
            if let Some((_, response)) = self.scripted.remove(index) {
                return response;
            }
        }
        if let Some(index) = self.injected.iter().position(|(code, _)| *code == info.code) {
            if let Some((_, rc)) = self.injected.remove(index) {
                return error_response(rc);
            }
        }
        if let Some(&rc) = self.failures.get(&info.code) {
            return error_response(rc);
        }

        match self.dispatch(&info) {
            Ok((handles, parameters)) => self.respond(&info, &handles, &parameters),
            Err(rc) => error_response(rc),
        }
    }

    fn dispatch(&mut self, info: &MessageInfo) -> Result<(Vec<Handle>, Vec<u8>), ResponseCode> {
        self.check_references(info)?;
        match info.code {
            TPM_CC_STARTUP => {
                if self.started {
                    return Err(TPM_RC_INITIALIZE);
                }
                self.started = true;
                Ok((vec![], vec![]))
            }
            TPM_CC_LOAD | TPM_CC_CREATE_PRIMARY | TPM_CC_LOAD_EXTERNAL => {
                // A refused load does not use up an identity.
                let handle = self.insert_object(self.next_identity)?;
                self.next_identity += 1;
                Ok((vec![handle], vec![]))
            }
            TPM_CC_START_AUTH_SESSION => {
                if self.loaded_sessions() >= self.session_slots {
                    return Err(TPM_RC_SESSION_MEMORY);
                }
                if self.sessions.len() >= self.max_sessions {
                    return Err(TPM_RC_SESSION_HANDLES);
                }
                let handle = self.next_session;
                self.next_session += 1;
                self.sessions.insert(handle, true);
                Ok((vec![handle], vec![]))
            }
            TPM_CC_CONTEXT_SAVE => self.context_save(info.handles[0]),
            TPM_CC_CONTEXT_LOAD => self.context_load(&info.parameter_data),
            TPM_CC_FLUSH_CONTEXT => {
                let target = flush_target(info).map_err(|_| TPM_RC_SIZE)?;
                self.flush(target)?;
                Ok((vec![], vec![]))
            }
            TPM_CC_GET_CAPABILITY => self.get_capability(&info.parameter_data),
            TPM_CC_SIGN => {
                let identity = self.objects.get(&info.handles[0]).copied().unwrap_or(0);
                Ok((vec![], identity.to_be_bytes().to_vec()))
            }
            _ => Ok((vec![], vec![])),
        }
    }

    fn check_references(&self, info: &MessageInfo) -> Result<(), ResponseCode> {
        for &handle in &info.handles {
            if is_transient_handle(handle) && !self.objects.contains_key(&handle) {
                return Err(TPM_RC_REFERENCE_H0);
            }
            if is_session_handle(handle) && self.sessions.get(&handle) != Some(&true) {
                return Err(TPM_RC_REFERENCE_H0);
            }
        }
        for &session in &info.session_handles {
            if session != TPM_RS_PW && self.sessions.get(&session) != Some(&true) {
                return Err(TPM_RC_REFERENCE_S0);
            }
        }
        Ok(())
    }

    fn insert_object(&mut self, identity: u32) -> Result<Handle, ResponseCode> {
        if self.objects.len() >= self.object_slots {
            return Err(TPM_RC_OBJECT_MEMORY);
        }
        let handle = self.next_object;
        self.next_object += 1;
        self.objects.insert(handle, identity);
        Ok(handle)
    }

    fn context_save(&mut self, handle: Handle) -> Result<(Vec<Handle>, Vec<u8>), ResponseCode> {
        let saved = if is_transient_handle(handle) {
            Saved::Object(*self.objects.get(&handle).ok_or(TPM_RC_REFERENCE_H0)?)
        } else if is_session_handle(handle) {
            // A session context can only be loaded from its latest save.
            self.saved.retain(|_, s| *s != Saved::Session(handle));
            self.sessions.insert(handle, false);
            Saved::Session(handle)
        } else {
            return Err(TPM_RC_HANDLE);
        };
        self.sequence += 1;
        self.saved.insert(self.sequence, saved);
        let context = SavedContext {
            sequence: self.sequence,
            saved_handle: handle,
            hierarchy: TPM_RH_NULL,
            blob: self.sequence.to_be_bytes().to_vec(),
        };
        Ok((vec![], context.encode()))
    }

    fn context_load(&mut self, parameters: &[u8]) -> Result<(Vec<Handle>, Vec<u8>), ResponseCode> {
        let context = SavedContext::decode(parameters).map_err(|_| TPM_RC_SIZE)?;
        match self.saved.get(&context.sequence).copied() {
            Some(Saved::Object(identity)) => {
                let handle = self.insert_object(identity)?;
                Ok((vec![handle], vec![]))
            }
            Some(Saved::Session(handle)) => {
                if self.loaded_sessions() >= self.session_slots {
                    return Err(TPM_RC_SESSION_MEMORY);
                }
                self.saved.remove(&context.sequence);
                self.sessions.insert(handle, true);
                Ok((vec![handle], vec![]))
            }
            None => Err(TPM_RC_VALUE),
        }
    }

    fn flush(&mut self, target: Handle) -> Result<(), ResponseCode> {
        if is_transient_handle(target) {
            self.objects.remove(&target).ok_or(FLUSH_UNKNOWN)?;
        } else if is_session_handle(target) {
            self.sessions.remove(&target).ok_or(FLUSH_UNKNOWN)?;
            self.saved.retain(|_, s| *s != Saved::Session(target));
        } else {
            return Err(FLUSH_UNKNOWN);
        }
        Ok(())
    }

    fn get_capability(&self, parameters: &[u8]) -> Result<(Vec<Handle>, Vec<u8>), ResponseCode> {
        let query = HandleQuery::decode(parameters).map_err(|_| TPM_RC_VALUE)?;
        let kind = handle_type(query.property);
        let matching: Vec<Handle> = self
            .objects
            .keys()
            .chain(self.sessions.keys())
            .copied()
            .filter(|&h| handle_type(h) == kind && h >= query.property)
            .collect();
        let count = query.count as usize;
        let list = HandleList {
            more_data: matching.len() > count,
            handles: matching.into_iter().take(count).collect(),
        };
        Ok((vec![], list.encode()))
    }

    /// Success response mirroring the command's continue bits. Sessions the
    /// caller did not continue are released.
    fn respond(&mut self, info: &MessageInfo, handles: &[Handle], parameters: &[u8]) -> Vec<u8> {
        let mut auth = Vec::new();
        for (&session, &continued) in info.session_handles.iter().zip(&info.session_continued) {
            if !continued && session != TPM_RS_PW {
                self.sessions.remove(&session);
            }
            auth.push(AuthBlock::new(0, continued));
        }
        encode_response(TPM_RC_SUCCESS, handles, &auth, parameters)
    }
}

/// Cheaply cloneable handle to a shared simulated device. Hand one clone to
/// the resource manager and keep another for assertions.
#[derive(Clone)]
pub struct FakeTpm {
    state: Arc<Mutex<DeviceState>>,
}

impl Default for FakeTpm {
    fn default() -> Self {
        Self::with_slots(3, 3)
    }
}

impl FakeTpm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(object_slots: usize, session_slots: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState::new(object_slots, session_slots))),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    /// The next command with `code` fails with `rc`.
    pub fn inject(&self, code: CommandCode, rc: ResponseCode) {
        self.state().injected.push_back((code, rc));
    }

    /// Every command with `code` fails with `rc` until cleared.
    pub fn fail_always(&self, code: CommandCode, rc: ResponseCode) {
        self.state().failures.insert(code, rc);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// The next command with `code` receives `response` verbatim.
    pub fn script(&self, code: CommandCode, response: Vec<u8>) {
        self.state().scripted.push_back((code, response));
    }

    /// Puts resources on the device as if left over from an earlier run.
    pub fn preload(&self, objects: usize, hmac_sessions: usize, policy_sessions: usize) {
        let mut state = self.state();
        for i in 0..objects {
            let handle = state.next_object;
            state.next_object += 1;
            state.objects.insert(handle, 1000 + i as u32);
        }
        for _ in 0..hmac_sessions {
            let handle = state.next_session;
            state.next_session += 1;
            state.sessions.insert(handle, true);
        }
        for i in 0..policy_sessions {
            state.sessions.insert(POLICY_SESSION_FIRST + i as u32, true);
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state().healthy = healthy;
    }

    pub fn commands_sent(&self) -> usize {
        self.state().log.len()
    }

    /// Parsed commands received after the first `since`.
    pub fn commands_after(&self, since: usize) -> Vec<MessageInfo> {
        self.state().log[since..]
            .iter()
            .filter_map(|c| parse_command(c).ok())
            .collect()
    }

    pub fn count(&self, code: CommandCode) -> usize {
        self.commands_after(0)
            .iter()
            .filter(|c| c.code == code)
            .count()
    }

    pub fn last_command(&self) -> MessageInfo {
        let state = self.state();
        parse_command(state.log.last().unwrap()).unwrap()
    }

    pub fn is_object_loaded(&self, actual: Handle) -> bool {
        self.state().objects.contains_key(&actual)
    }

    pub fn session(&self, handle: Handle) -> Option<bool> {
        self.state().sessions.get(&handle).copied()
    }
}

impl Transceiver for FakeTpm {
    fn send_and_wait(&mut self, command: &[u8]) -> Vec<u8> {
        self.state().execute(command)
    }

    fn init(&mut self) -> bool {
        self.state().healthy
    }
}
