pub mod dispatch;
pub mod init;
pub mod messages;
pub mod presence;
