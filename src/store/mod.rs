pub mod board;
pub mod document;
pub mod ledger;
pub mod lock;
pub mod roster;
