//! Shared types for the warden DHCP management plane: error taxonomy, the
//! capacity counter, range arithmetic, and entity models.

pub mod capacity;
pub mod error;
pub mod models;
pub mod range;

pub use capacity::Capacity;
pub use error::{Error, ErrorKind, Result};
