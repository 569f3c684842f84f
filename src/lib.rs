pub mod engine;
pub mod log;
pub mod ui;
