pub mod config;
pub mod hypothesis;
pub mod model;
pub mod session;
pub mod stats;
pub mod types;
