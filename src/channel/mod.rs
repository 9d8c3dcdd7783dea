// Module declarations
mod core;
mod listeners;
mod presence;
mod state;

// Public API exports
pub use core::Channel;
pub use listeners::{Callback, EventPayload, ListenerRegistry};
pub use presence::{MemberInfo, Members};
pub use state::{ChannelKind, ChannelState, ChannelStatus};
