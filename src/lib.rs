pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod favorites;
pub mod history;
pub mod library;
pub mod logging;
pub mod model;
pub mod transport;
pub mod ui;
