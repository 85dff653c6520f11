// Library for the daemon, demos and tests

pub mod config;
pub mod coordination;
pub mod error;
pub mod models;
pub mod polling;
pub mod probe;
pub mod reader;
pub mod session_manager;
pub mod sink;
pub mod store;
pub mod version;
