pub mod app;
pub mod config;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod ui;
