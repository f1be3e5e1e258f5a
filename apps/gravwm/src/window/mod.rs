pub mod client;
pub mod drag;
pub mod error;
pub mod gravity;
pub mod hints;
pub mod hooks;
pub mod manager;
pub mod registry;
pub mod screen;
pub mod tag;
pub mod view;
