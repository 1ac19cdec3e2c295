pub mod config;
pub mod display;
pub mod error;
pub mod feed;
pub mod health;
pub mod network;
pub mod notes;
pub mod scheduler;
pub mod slideshow;
pub mod state;
pub mod tui;
