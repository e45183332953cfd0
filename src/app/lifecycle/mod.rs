pub mod context;
pub mod shutdown;
pub mod startup;
pub mod task;
