pub mod messaging_service;
pub use messaging_service::{MessagingError, MessagingService};

pub mod messaging_service_impl;
pub use messaging_service_impl::SeaOrmMessagingService;

pub mod user_service;
pub use user_service::{UserError, UserService};

pub mod user_service_impl;
pub use user_service_impl::AccessChainUserService;
