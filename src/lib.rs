// Crate root library declaration and module exports.
pub mod cli;
pub mod config;
pub mod context;
pub mod controller;
pub mod display;
pub mod model;
pub mod storage;
pub mod store;
pub mod vault;
