//! Residency tracking for authorization sessions.
//!
//! Sessions keep the handle the device assigned them; only whether they are
//! loaded or saved is managed here.

use std::collections::{HashMap, HashSet};

use tpmrm_protocol::codes::Handle;

use crate::error::HandleError;
use crate::handle::{HandleInfo, Residency};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRegistry {
    capacity: usize,
    sessions: HashMap<Handle, HandleInfo>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sessions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session: Handle) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn lookup(&self, session: Handle) -> Result<&HandleInfo, HandleError> {
        self.sessions
            .get(&session)
            .ok_or(HandleError::Unknown(session))
    }

    /// Tracks a session handle the device just returned. A session that is
    /// already tracked is marked loaded again.
    pub fn record_new(&mut self, session: Handle, now: u64) -> Result<(), HandleError> {
        if let Some(info) = self.sessions.get_mut(&session) {
            info.residency = Residency::Loaded(session);
            info.time_of_last_use = now;
            return Ok(());
        }
        if self.sessions.len() >= self.capacity {
            return Err(HandleError::SessionCapacity);
        }
        self.sessions.insert(session, HandleInfo::loaded(session, now));
        Ok(())
    }

    pub fn mark_loaded(&mut self, session: Handle, now: u64) {
        if let Some(info) = self.sessions.get_mut(&session) {
            info.residency = Residency::Loaded(session);
            info.time_of_last_use = now;
        }
    }

    pub fn mark_saved(&mut self, session: Handle, context: Vec<u8>) {
        if let Some(info) = self.sessions.get_mut(&session) {
            info.residency = Residency::Saved(context);
        }
    }

    pub fn touch(&mut self, session: Handle, now: u64) {
        if let Some(info) = self.sessions.get_mut(&session) {
            info.time_of_last_use = now;
        }
    }

    /// Stops tracking a session the device has already released.
    pub fn discontinue(&mut self, session: Handle) -> Option<HandleInfo> {
        self.sessions.remove(&session)
    }

    /// Least recently used loaded session outside `exclude`.
    pub fn lru_loaded(&self, exclude: &HashSet<Handle>) -> Option<Handle> {
        self.least_recent(exclude, true)
    }

    /// Least recently used session outside `exclude`, loaded or not.
    pub fn lru_tracked(&self, exclude: &HashSet<Handle>) -> Option<Handle> {
        self.least_recent(exclude, false)
    }

    fn least_recent(&self, exclude: &HashSet<Handle>, loaded_only: bool) -> Option<Handle> {
        self.sessions
            .iter()
            .filter(|(handle, info)| !exclude.contains(*handle) && (!loaded_only || info.is_loaded()))
            .min_by_key(|(handle, info)| (info.time_of_last_use, **handle))
            .map(|(&handle, _)| handle)
    }

    /// Saved sessions with their contexts, oldest created first.
    pub fn saved_by_creation(&self) -> Vec<(Handle, Vec<u8>)> {
        let mut saved: Vec<_> = self
            .sessions
            .iter()
            .filter_map(|(&handle, info)| {
                info.saved_context()
                    .map(|context| (info.time_of_create, handle, context.to_vec()))
            })
            .collect();
        saved.sort_unstable_by_key(|(created, handle, _)| (*created, *handle));
        saved
            .into_iter()
            .map(|(_, handle, context)| (handle, context))
            .collect()
    }
}
