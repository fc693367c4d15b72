use tpmrm_protocol::codes::Handle;

/// Where a tracked resource currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Residency {
    /// Resident in the device under this actual handle.
    Loaded(Handle),
    /// Evicted; this saved context reloads it.
    Saved(Vec<u8>),
}

/// Bookkeeping shared by tracked objects and sessions. Times are ticks of the
/// manager's logical clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleInfo {
    pub residency: Residency,
    pub time_of_create: u64,
    pub time_of_last_use: u64,
}

impl HandleInfo {
    pub fn loaded(actual: Handle, now: u64) -> Self {
        Self {
            residency: Residency::Loaded(actual),
            time_of_create: now,
            time_of_last_use: now,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.residency, Residency::Loaded(_))
    }

    pub fn actual_handle(&self) -> Option<Handle> {
        match self.residency {
            Residency::Loaded(actual) => Some(actual),
            Residency::Saved(_) => None,
        }
    }

    pub fn saved_context(&self) -> Option<&[u8]> {
        match &self.residency {
            Residency::Loaded(_) => None,
            Residency::Saved(context) => Some(context),
        }
    }
}
