// Infrastructure module - Background timers, tasks and the authorization client
pub mod heartbeat;
pub mod http;
pub mod task_manager;
pub mod timer;

pub use heartbeat::{HeartbeatManager, HeartbeatSink, HeartbeatStage};
pub use http::{AuthRequest, Authorizer, HttpAuthorizer, xsrf_token_from_cookies};
pub use task_manager::TaskManager;
pub use timer::{GiveUpReason, ReconnectDecision, ReconnectPolicy, ScheduledTask};
