//! Transport adapters for capability servers
//!
//! The registry only talks to servers through the `Transport` trait.
//!
//! ```text
//! ServerRegistry ──► Transport ──► RmcpTransport ──► child process (stdio, JSON-RPC)
//!                              └─► MockTransport  (tests)
//! ```

mod child_process;
mod mock;
mod traits;

pub use child_process::RmcpTransport;
pub use mock::{MockServer, MockTransport, TransportCall};
pub use traits::{Transport, TransportError, TransportResult};
