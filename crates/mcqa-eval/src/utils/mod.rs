pub mod collections;
pub mod telemetry;

pub use collections::{argmax, reduce_by_mask, sorted_unique};
pub use telemetry::{TelemetryInitError, init_tracing};
