pub mod ping;
pub mod query;
pub mod watch;
