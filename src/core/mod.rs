pub mod ads;
pub mod clock;
pub mod config_manager;
pub mod models;
pub mod observability;
