//! Request-path filters that sit in front of the API handlers.

pub mod access_window;
pub mod rate_limit;
pub mod request_log;
pub mod role;

pub use access_window::AccessWindow;
pub use rate_limit::{RateDecision, RateLimiter};
pub use request_log::RequestLog;
pub use role::Role;
