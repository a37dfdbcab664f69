pub mod format;
pub mod server;
pub mod tools;
