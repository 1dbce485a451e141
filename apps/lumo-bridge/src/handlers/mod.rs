//! Handlers 模块

pub mod control;
pub mod metrics;
pub mod schedules;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use control::*;
pub use metrics::*;
pub use schedules::*;
pub use status::*;
