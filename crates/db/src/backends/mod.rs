//! Database Backend Abstractions
//!
//! Production code runs on [`MySqlBackend`]; tests inject their own
//! [`DatabaseBackend`] to observe pool construction and connection checkout.

pub mod core;
pub mod mysql;

pub use self::core::*;
pub use mysql::{MySqlBackend, MySqlPoolHandle};
