pub mod app;
pub mod audio;
pub mod bridge;
pub mod config;
pub mod cover;
pub mod data;
pub mod error;
pub mod library;
pub mod lyrics;
pub mod model;
pub mod selector;
pub mod session;
pub mod timer;
