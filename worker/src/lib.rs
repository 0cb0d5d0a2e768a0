//! Blacktree Worker Library
//!
//! Core modules for the blacktree deployment worker.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod handlers;
pub mod logs;
pub mod models;
pub mod ports;
pub mod queue;
pub mod settings;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod workers;
