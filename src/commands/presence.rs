use colored::Colorize;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::board::ChatBoard;

pub fn join(board: &ChatBoard, user: &str, format: Format) -> Result<()> {
    let entry = board.roster().join(user)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string(&entry)?),
        Format::Pretty => println!("Joined as '{}'", entry.name.cyan().bold()),
        Format::Minimal => println!("{}", entry.name),
    }
    Ok(())
}

pub fn heartbeat(board: &ChatBoard, user: &str, format: Format) -> Result<()> {
    let entry = board.roster().heartbeat(user)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string(&entry)?),
        Format::Pretty => println!(
            "{} {}",
            entry.name.cyan(),
            format!("seen {}", entry.last_seen.format("%H:%M:%S")).dimmed()
        ),
        Format::Minimal => println!("{}", entry.name),
    }
    Ok(())
}

/// Lists active users. Expired entries are pruned from storage as a side effect.
pub fn users(board: &ChatBoard, format: Format) -> Result<()> {
    let users = board.roster().prune_and_list_active()?;
    output::print_users(&users, format)
}

pub fn leave(board: &ChatBoard, user: &str, format: Format) -> Result<()> {
    board.roster().leave(user)?;
    let user = user.trim();
    match format {
        Format::Json => println!("{}", serde_json::json!({"left": user})),
        Format::Pretty => println!("Left: '{}'", user.cyan()),
        Format::Minimal => println!("{user}"),
    }
    Ok(())
}
