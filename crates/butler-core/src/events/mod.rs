//! Registry event bus
//!
//! Every lifecycle transition, tool call and resource read is published as
//! an immutable `RegistryEvent`. Consumers either register per-kind
//! listeners or drain a channel from `subscribe()`.

mod bus;
mod event;

pub use bus::{EventBus, EventHandler, ListenerId};
pub use event::{RegistryEvent, RegistryEventKind};
