pub mod controller;
pub mod sampler;

pub use controller::{PerformanceThresholds, ThrottleController, ThrottleError, ThrottleEvent};
pub use sampler::PerformanceSampler;
