pub mod atoms;
pub mod gateway;
pub mod setup;
