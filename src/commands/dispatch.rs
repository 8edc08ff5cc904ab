use std::io::Read;

use serde_json::Value;

use crate::dispatch::{self, Reply};
use crate::error::Result;
use crate::store::board::ChatBoard;

/// Run one request envelope and print the reply body exactly as a client
/// would receive it. Malformed JSON is answered like an unknown action.
pub fn run(board: &ChatBoard, request: Option<&str>) -> Result<()> {
    let raw = match request {
        Some(r) => r.to_string(),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let value: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
    let reply = dispatch::handle(board, &value);
    match &reply {
        Reply::Json(_) => println!("{}", reply.render()),
        Reply::Attachment { .. } => print!("{}", reply.render()),
    }
    Ok(())
}
