pub mod csrf;
pub mod metrics;
pub mod sessions;
