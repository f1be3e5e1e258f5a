pub mod backend;
pub mod context;
pub mod event;
pub mod geometry;
