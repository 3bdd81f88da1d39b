pub mod audit;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod files;
pub mod hooks;
pub mod maintenance;
pub mod model;
pub mod scan;
pub mod setup;
pub mod store;
pub mod sweep;

pub use config::Config;
pub use sweep::Sweeper;
