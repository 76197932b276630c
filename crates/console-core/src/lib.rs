pub mod capture;
pub mod config;
mod config_env;
pub mod console;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod session;
pub mod sync;
pub mod transport;
