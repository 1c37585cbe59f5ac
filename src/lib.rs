pub mod cache;
pub mod clock;
pub mod config;
pub mod directory;
pub mod inventory;
pub mod logging;
pub mod view;
