use chrono::Local;
use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::model::{Message, MessageKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

pub fn print_message(msg: &Message, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(msg)?),
        Format::Pretty => {
            let time = msg.created_at.with_timezone(&Local).format("%H:%M:%S");
            match msg.kind {
                MessageKind::User => println!(
                    "{} {} {}",
                    format!("[{time}]").dimmed(),
                    format!("{}:", msg.author).cyan().bold(),
                    msg.body
                ),
                MessageKind::System => println!(
                    "{} {}",
                    format!("[{time}]").dimmed(),
                    msg.body.yellow().italic()
                ),
            }
        }
        Format::Minimal => println!(
            "{:>20} {:12} {}",
            msg.id,
            truncate(&msg.author, 12),
            msg.body
        ),
    }
    Ok(())
}

pub fn print_messages(messages: &[Message], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(messages)?),
        Format::Pretty => {
            if messages.is_empty() {
                println!("{}", "No messages.".dimmed());
            }
            for msg in messages {
                print_message(msg, Format::Pretty)?;
            }
        }
        Format::Minimal => {
            println!("{:>20} {:12} MESSAGE", "ID", "AUTHOR");
            println!("{}", "-".repeat(50));
            for msg in messages {
                print_message(msg, Format::Minimal)?;
            }
        }
    }
    Ok(())
}

pub fn print_users(users: &[String], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(users)?),
        Format::Pretty => {
            if users.is_empty() {
                println!("{}", "Nobody is online.".dimmed());
            } else {
                println!("{} online", users.len().to_string().bold());
                for name in users {
                    println!("  {} {}", "●".green(), name.cyan());
                }
            }
        }
        Format::Minimal => {
            for name in users {
                println!("{name}");
            }
        }
    }
    Ok(())
}

/// Shorten to `max_len` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}
