use std::fs;
use std::path::Path;

use chrono::Local;
use colored::Colorize;

use crate::error::Result;
use crate::model::MessageKind;
use crate::output::{self, Format};
use crate::store::board::ChatBoard;
use crate::store::ledger;

pub fn list(board: &ChatBoard, since: u64, format: Format) -> Result<()> {
    let messages = board.ledger().query(since);
    output::print_messages(&messages, format)
}

pub fn send(board: &ChatBoard, user: &str, message: &str, format: Format) -> Result<()> {
    let msg = board.ledger().append(user, message, MessageKind::User)?;
    output::print_message(&msg, format)
}

pub fn system(board: &ChatBoard, message: &str, format: Format) -> Result<()> {
    let msg = board.ledger().append("", message, MessageKind::System)?;
    output::print_message(&msg, format)
}

pub fn clear(board: &ChatBoard, format: Format) -> Result<()> {
    board.ledger().clear()?;
    match format {
        Format::Json => println!("{}", serde_json::json!({"cleared": true})),
        Format::Pretty => println!("{}", "Messages cleared.".green()),
        Format::Minimal => println!("ok"),
    }
    Ok(())
}

/// Write the plain-text export to `out`, or to stdout when no path is given.
pub fn export(board: &ChatBoard, out: Option<&Path>, format: Format) -> Result<()> {
    let now = Local::now();
    let messages = board.ledger().export();
    let text = ledger::render_export(&messages, now);

    let Some(path) = out else {
        print!("{text}");
        return Ok(());
    };

    let path = if path.is_dir() {
        path.join(ledger::export_filename(now))
    } else {
        path.to_path_buf()
    };
    fs::write(&path, &text)?;
    match format {
        Format::Json => println!(
            "{}",
            serde_json::json!({"path": path.display().to_string(), "messages": messages.len()})
        ),
        Format::Pretty => println!(
            "Exported {} messages to {}",
            messages.len().to_string().bold(),
            path.display().to_string().cyan()
        ),
        Format::Minimal => println!("{}", path.display()),
    }
    Ok(())
}
