use std::fs;
use std::path::Path;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::BoardConfig;
use crate::error::Result;
use crate::model::{Message, PresenceEntry};
use crate::store::document::{self, DocumentStore, FsDocumentStore, MemoryDocumentStore};
use crate::store::ledger::{MESSAGES_KEY, MessageLedger};
use crate::store::lock::{self, FileGate, Gate, MemoryGate};
use crate::store::roster::{PresenceRoster, USERS_KEY};

/// A chat board: the two documents, the gate that serializes writers, and the
/// clock used for timestamps and presence expiry.
pub struct ChatBoard {
    config: BoardConfig,
    store: Box<dyn DocumentStore>,
    gate: Box<dyn Gate>,
    clock: Box<dyn Clock>,
}

impl ChatBoard {
    /// Open the board under `config.data_dir`, creating the directory and
    /// seeding missing documents.
    pub fn open(config: BoardConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let gate = FileGate::new(config.lock_path());
        let board = Self::from_parts(
            config,
            Box::new(FsDocumentStore),
            Box::new(gate),
            Box::new(SystemClock),
        );
        board.ensure_documents()?;
        Ok(board)
    }

    /// A board that never touches the filesystem.
    pub fn in_memory(config: BoardConfig) -> Self {
        Self::from_parts(
            config,
            Box::new(MemoryDocumentStore::new()),
            Box::new(MemoryGate::new()),
            Box::new(SystemClock),
        )
    }

    pub fn from_parts(
        config: BoardConfig,
        store: Box<dyn DocumentStore>,
        gate: Box<dyn Gate>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            gate,
            clock,
        }
    }

    /// Seed `{"messages": []}` and `{"users": []}` where the documents are missing.
    pub fn ensure_documents(&self) -> Result<()> {
        lock::with_exclusive_access(self.gate.as_ref(), || {
            self.seed(&self.config.messages_path(), MESSAGES_KEY)?;
            self.seed(&self.config.users_path(), USERS_KEY)
        })
    }

    fn seed(&self, path: &Path, key: &str) -> Result<()> {
        if self.store.exists(path) {
            return Ok(());
        }
        debug!(path = %path.display(), "seeding empty document");
        document::write_sequence::<serde_json::Value>(self.store.as_ref(), path, key, &[])
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn ledger(&self) -> MessageLedger<'_> {
        MessageLedger::new(
            self.store.as_ref(),
            self.gate.as_ref(),
            self.clock.as_ref(),
            &self.config,
        )
    }

    pub fn roster(&self) -> PresenceRoster<'_> {
        PresenceRoster::new(
            self.store.as_ref(),
            self.gate.as_ref(),
            self.clock.as_ref(),
            &self.config,
        )
    }

    pub fn messages(&self) -> Vec<Message> {
        self.ledger().export()
    }

    pub fn presence(&self) -> Vec<PresenceEntry> {
        self.roster().entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageKind;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn open_seeds_missing_documents() {
        let dir = tempdir().unwrap();
        let config = BoardConfig::new(dir.path().join("data"));
        let board = ChatBoard::open(config.clone()).unwrap();

        assert_eq!(
            FsDocumentStore.read(&config.messages_path()),
            json!({"messages": []})
        );
        assert_eq!(FsDocumentStore.read(&config.users_path()), json!({"users": []}));
        assert!(board.messages().is_empty());
        assert!(board.presence().is_empty());
    }

    #[test]
    fn reopen_keeps_existing_documents() {
        let dir = tempdir().unwrap();
        let config = BoardConfig::new(dir.path());
        {
            let board = ChatBoard::open(config.clone()).unwrap();
            board.ledger().append("bob", "hi", MessageKind::User).unwrap();
            board.roster().join("bob").unwrap();
        }
        let board = ChatBoard::open(config).unwrap();
        assert_eq!(board.messages().len(), 1);
        assert_eq!(board.presence().len(), 1);
    }

    #[test]
    fn corrupt_document_reads_as_empty_and_is_rewritten_on_append() {
        let dir = tempdir().unwrap();
        let config = BoardConfig::new(dir.path());
        let board = ChatBoard::open(config.clone()).unwrap();
        fs::write(config.messages_path(), "garbage{").unwrap();

        assert!(board.ledger().query(0).is_empty());
        board.ledger().append("bob", "fresh", MessageKind::User).unwrap();
        assert_eq!(board.ledger().query(0).len(), 1);
    }
}
