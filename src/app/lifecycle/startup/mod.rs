mod startup;
mod tasks;

pub use startup::build_start_lifecycle;
