//! Logging abstractions
//!
//! Components take an `Arc<dyn Logger>` so hosts can route engine logs
//! wherever they like. `TracingLogger` is the default backend.

mod noop;
mod tracing_logger;
mod traits;

pub use noop::NoOpLogger;
pub use tracing_logger::{init_tracing, TracingLogger};
pub use traits::Logger;
