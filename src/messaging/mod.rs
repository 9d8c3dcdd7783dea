// Messaging module - Event names and inbound frame routing
pub mod event;
pub mod router;

pub use event::{ControlEvent, EventNamespace, is_internal};
pub use router::{MessageRouter, Route};
