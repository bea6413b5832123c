//! Command heartbeat tracking.
//!
//! Every identifier the peer names gets one [`CommandEntry`] holding the
//! instant it was last seen. An entry stays active while the peer keeps
//! re-sending it faster than the command timeout and is demoted by
//! [`CommandRegistry::sweep`] once the peer goes quiet.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::{String, index_map::FnvIndexMap};

use crate::{
    clock::{Duration, Instant},
    config::{MAX_COMMANDS, MAX_IDENTIFIER_LENGTH},
    error::Error,
};

pub type Identifier = String<MAX_IDENTIFIER_LENGTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    // The most recent frame naming this command
    pub last_seen: Instant,
    pub active: bool,
}

#[derive(Default)]
pub struct CommandRegistry {
    entries: FnvIndexMap<Identifier, CommandEntry, MAX_COMMANDS>,
    last_activity: Option<Instant>,
}

impl CommandRegistry {
    pub const fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
            last_activity: None,
        }
    }

    /// Mark the command as seen at `observed_at`, creating it on first sight
    pub fn record(&mut self, identifier: &str, observed_at: Instant) -> Result<(), Error> {
        let entry = CommandEntry {
            last_seen: observed_at,
            active: true,
        };

        let key = Identifier::try_from(identifier).map_err(|_| Error::IdentifierTooLong)?;
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = entry;
        } else {
            self.entries
                .insert(key, entry)
                .map_err(|_| Error::RegistryFull)?;
        }

        self.last_activity = Some(observed_at);
        Ok(())
    }

    /// Demote every active command not seen for longer than `timeout`.
    ///
    /// Inactive commands are never re-activated here. A command seen after
    /// `now` was sampled counts as fresh.
    pub fn sweep(&mut self, now: Instant, timeout: Duration) {
        for entry in self.entries.values_mut().filter(|entry| entry.active) {
            if let Some(elapsed) = now.checked_duration_since(entry.last_seen) {
                if elapsed > timeout {
                    entry.active = false;
                }
            }
        }
    }

    /// Unknown identifiers are inactive
    pub fn is_active(&self, identifier: &str) -> bool {
        self.entry(identifier).is_some_and(|entry| entry.active)
    }

    pub fn entry(&self, identifier: &str) -> Option<&CommandEntry> {
        // Too long to have ever been recorded
        let key = Identifier::try_from(identifier).ok()?;
        self.entries.get(&key)
    }

    /// Release every command but keep the identifiers and their history
    pub fn clear_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.active = false;
        }
    }

    /// Drop every identifier, as if no frame had ever been received
    pub fn forget_all(&mut self) {
        self.entries.clear();
        self.last_activity = None;
    }

    /// Identifiers currently held by the peer
    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.active)
            .map(|(identifier, _)| identifier.as_str())
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry shared between the frame sink and the poll loop.
///
/// Each access holds the critical section for one operation only.
pub struct SharedRegistry {
    inner: Mutex<RefCell<CommandRegistry>>,
}

impl SharedRegistry {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(CommandRegistry::new())),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut CommandRegistry) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new()
    }
}
