//! HTTP API handlers for ocw-tasks

pub mod callbacks;
pub mod caller;
pub mod health;
pub mod json_body;
pub mod tasks;

pub use callbacks::callback_routes;
pub use caller::AuthenticatedCaller;
pub use health::health_routes;
pub use json_body::JsonBody;
pub use tasks::task_routes;
