use crate::config::BoardConfig;
use crate::error::Result;
use crate::store::board::ChatBoard;

pub fn run(config: BoardConfig) -> Result<()> {
    let board = ChatBoard::open(config)?;
    eprintln!(
        "Initialized chat board in {}",
        board.config().data_dir.display()
    );
    Ok(())
}
