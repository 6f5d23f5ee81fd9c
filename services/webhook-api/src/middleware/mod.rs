// Request extraction for GitHub webhook deliveries
pub mod event;

pub use event::{EventKind, GitHubDelivery, HookError};
