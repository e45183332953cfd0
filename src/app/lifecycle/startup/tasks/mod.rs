pub mod ad_cache;
pub mod config_load;
pub mod observability;
pub mod start_server;
