mod query;
mod users;

pub use query::cmd_query;
pub use users::cmd_users;
