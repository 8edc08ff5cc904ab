use chrono::{DateTime, Local, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::BoardConfig;
use crate::error::{ChatError, Result};
use crate::model::{Message, MessageKind};
use crate::store::document::{self, DocumentStore};
use crate::store::lock::{self, Gate};

pub const MESSAGES_KEY: &str = "messages";
pub const SYSTEM_AUTHOR: &str = "System";

const EXPORT_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// The capped, append-only message collection stored in `messages.json`.
pub struct MessageLedger<'a> {
    store: &'a dyn DocumentStore,
    gate: &'a dyn Gate,
    clock: &'a dyn Clock,
    config: &'a BoardConfig,
}

impl<'a> MessageLedger<'a> {
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

    fn load(&self) -> Vec<Message> {
        document::read_sequence(self.store, &self.config.messages_path(), MESSAGES_KEY)
    }

    /// Validate and append a message, then trim the ledger to the retention cap.
    ///
    /// System messages ignore `author` and are stored as [`SYSTEM_AUTHOR`].
    pub fn append(&self, author: &str, body: &str, kind: MessageKind) -> Result<Message> {
        let body = body.trim();
        let author = match kind {
            MessageKind::User => author.trim(),
            MessageKind::System => SYSTEM_AUTHOR,
        };
        if author.is_empty() {
            return Err(ChatError::InvalidInput("user is empty".into()));
        }
        if body.is_empty() {
            return Err(ChatError::InvalidInput("message is empty".into()));
        }
        if kind == MessageKind::User && body.chars().count() > self.config.max_body_chars {
            return Err(ChatError::InvalidInput(format!(
                "message is too long (max {} characters)",
                self.config.max_body_chars
            )));
        }

        lock::with_exclusive_access(self.gate, || {
            let mut messages = self.load();
            let now = self.clock.now();
            let last_id = messages.iter().map(|m| m.id).max().unwrap_or(0);
            let msg = Message {
                id: next_id(last_id, now),
                author: author.to_string(),
                body: body.to_string(),
                created_at: now,
                kind,
            };
            messages.push(msg.clone());

            let retention = self.config.retention;
            if messages.len() > retention {
                let excess = messages.len() - retention;
                messages.drain(..excess);
                debug!(dropped = excess, "ledger trimmed to retention cap");
            }

            document::write_sequence(
                self.store,
                &self.config.messages_path(),
                MESSAGES_KEY,
                &messages,
            )?;
            debug!(id = msg.id, author = %msg.author, kind = %msg.kind, "message appended");
            Ok(msg)
        })
    }

    /// Messages with `id > since_id` (everything when `since_id` is 0), limited
    /// to the most recent page, oldest first. Not gated.
    pub fn query(&self, since_id: u64) -> Vec<Message> {
        let mut messages = self.load();
        if since_id > 0 {
            messages.retain(|m| m.id > since_id);
        }
        let page = self.config.page_size;
        if messages.len() > page {
            messages.drain(..messages.len() - page);
        }
        messages
    }

    /// Replace the ledger with an empty sequence.
    pub fn clear(&self) -> Result<()> {
        lock::with_exclusive_access(self.gate, || {
            document::write_sequence::<Message>(
                self.store,
                &self.config.messages_path(),
                MESSAGES_KEY,
                &[],
            )
        })?;
        info!("message ledger cleared");
        Ok(())
    }

    /// The full retained ledger in insertion order. Not gated.
    pub fn export(&self) -> Vec<Message> {
        self.load()
    }
}

/// Next identifier: a clock-seeded value, floored at `last_id + 1` so the
/// sequence stays strictly increasing even if the wall clock stalls or steps back.
pub fn next_id(last_id: u64, now: DateTime<Utc>) -> u64 {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let seed = millis.saturating_mul(1000).saturating_add(random_below(1000));
    seed.max(last_id.saturating_add(1))
}

fn random_below(bound: u64) -> u64 {
    let mut bytes = [0_u8; std::mem::size_of::<u64>()];
    // The random part only spreads ids; monotonicity does not depend on it.
    match getrandom::fill(&mut bytes) {
        Ok(()) => u64::from_be_bytes(bytes) % bound,
        Err(_) => 0,
    }
}

/// Human-readable export: a header line, a blank line, then one
/// `[timestamp] author: body` line per message, in local time.
pub fn render_export(messages: &[Message], generated_at: DateTime<Local>) -> String {
    let mut out = format!(
        "=== Chat export - {} ===\n\n",
        generated_at.format(EXPORT_TIME_FORMAT)
    );
    for msg in messages {
        out.push_str(&export_line(msg));
        out.push('\n');
    }
    out
}

pub fn export_line(msg: &Message) -> String {
    let local = msg.created_at.with_timezone(&Local);
    format!(
        "[{}] {}: {}",
        local.format(EXPORT_TIME_FORMAT),
        msg.author,
        msg.body
    )
}

/// Suggested attachment name for an export produced at `generated_at`.
pub fn export_filename(generated_at: DateTime<Local>) -> String {
    format!("chat_export_{}.txt", generated_at.format("%Y-%m-%d"))
}
