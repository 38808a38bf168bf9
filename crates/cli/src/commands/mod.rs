pub mod chat;
pub mod init;
pub mod lookup;
pub mod sync;
