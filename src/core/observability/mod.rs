mod macros;
pub mod metrics;
mod provider;

pub use provider::*;
