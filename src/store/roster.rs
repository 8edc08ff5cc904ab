use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::BoardConfig;
use crate::error::{ChatError, Result};
use crate::model::PresenceEntry;
use crate::store::document::{self, DocumentStore};
use crate::store::lock::{self, Gate};

pub const USERS_KEY: &str = "users";

/// Users currently present on the board, stored in `users.json`.
///
/// Every mutation runs under the board gate, including the pruning done by
/// [`PresenceRoster::prune_and_list_active`].
pub struct PresenceRoster<'a> {
    store: &'a dyn DocumentStore,
    gate: &'a dyn Gate,
    clock: &'a dyn Clock,
    config: &'a BoardConfig,
}

impl<'a> PresenceRoster<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        gate: &'a dyn Gate,
        clock: &'a dyn Clock,
        config: &'a BoardConfig,
    ) -> Self {
        Self {
            store,
            gate,
            clock,
            config,
        }
    }

    fn load(&self) -> Vec<PresenceEntry> {
        document::read_sequence(self.store, &self.config.users_path(), USERS_KEY)
    }

    fn save(&self, entries: &[PresenceEntry]) -> Result<()> {
        document::write_sequence(self.store, &self.config.users_path(), USERS_KEY, entries)
    }

    /// Like `save`, but a storage failure is only logged. Presence upkeep
    /// (heartbeat, leave, prune) reports success to the client regardless.
    fn save_or_warn(&self, entries: &[PresenceEntry]) -> Result<()> {
        match self.save(entries) {
            Err(ChatError::StorageFailure(path)) => {
                warn!(path = %path, "roster change not persisted");
                Ok(())
            }
            other => other,
        }
    }

    /// Add `name` to the roster.
    ///
    /// Fails if any entry with that name exists, expired or not: a stale entry
    /// blocks the name until a prune pass removes it.
    pub fn join(&self, name: &str) -> Result<PresenceEntry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput("user name is empty".into()));
        }
        if name.chars().count() > self.config.max_name_chars {
            return Err(ChatError::InvalidInput(format!(
                "user name is too long (max {} characters)",
                self.config.max_name_chars
            )));
        }

        let entry = lock::with_exclusive_access(self.gate, || {
            let mut entries = self.load();
            if entries.iter().any(|e| e.name == name) {
                return Err(ChatError::NameTaken(name.to_string()));
            }
            let entry = PresenceEntry::new(name, self.clock.now());
            entries.push(entry.clone());
            self.save(&entries)?;
            Ok(entry)
        })?;
        info!(user = %entry.name, "user joined");
        Ok(entry)
    }

    /// Refresh `last_seen` for `name`, inserting the entry if it is missing.
    /// Never fails on a name collision.
    pub fn heartbeat(&self, name: &str) -> Result<PresenceEntry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput("user name is empty".into()));
        }

        lock::with_exclusive_access(self.gate, || {
            let mut entries = self.load();
            let now = self.clock.now();
            let entry = match entries.iter().position(|e| e.name == name) {
                Some(i) => {
                    entries[i].last_seen = now;
                    entries[i].clone()
                }
                None => {
                    debug!(user = %name, "heartbeat from unknown user, re-adding");
                    let entry = PresenceEntry::new(name, now);
                    entries.push(entry.clone());
                    entry
                }
            };
            self.save_or_warn(&entries)?;
            Ok(entry)
        })
    }

    /// Remove `name` from the roster. Removing an absent name succeeds.
    pub fn leave(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput("user name is empty".into()));
        }

        let removed = lock::with_exclusive_access(self.gate, || {
            let mut entries = self.load();
            let before = entries.len();
            entries.retain(|e| e.name != name);
            let removed = before - entries.len();
            self.save_or_warn(&entries)?;
            Ok(removed)
        })?;
        if removed > 0 {
            info!(user = %name, "user left");
        }
        Ok(())
    }

    /// Drop every expired entry, persist the survivors, and return their names
    /// in roster order.
    ///
    /// This is a write: the listing doubles as the roster's garbage collection.
    /// The names are returned even when the pruned roster cannot be saved.
    pub fn prune_and_list_active(&self) -> Result<Vec<String>> {
        lock::with_exclusive_access(self.gate, || {
            let entries = self.load();
            let now = self.clock.now();
            let timeout = self.config.presence_timeout;
            let before = entries.len();
            let active: Vec<PresenceEntry> = entries
                .into_iter()
                .filter(|e| e.is_active(now, timeout))
                .collect();
            if active.len() < before {
                debug!(expired = before - active.len(), "pruned expired users");
            }
            self.save_or_warn(&active)?;
            Ok(active.into_iter().map(|e| e.name).collect())
        })
    }

    /// Current roster without pruning. Not gated.
    pub fn entries(&self) -> Vec<PresenceEntry> {
        self.load()
    }
}
