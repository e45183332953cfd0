mod shutdown;
mod tasks;

pub use shutdown::build_shutdown_lifecycle;
