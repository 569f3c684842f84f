pub mod command;
pub mod config;
pub mod mi;
pub mod supervisor;
