pub mod influx;
pub mod registry;
pub mod reporter;

// Re-export common types
pub use influx::{FieldValue, InfluxSink, Point};
pub use registry::{counter, CounterRegistry};
pub use reporter::Reporter;
