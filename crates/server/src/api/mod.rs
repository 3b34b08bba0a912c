//! Domain-focused API endpoint modules, mirroring the teacher's
//! one-module-per-responsibility `api/` layout.

pub(crate) mod doc;
pub mod health;
pub mod intake;
pub mod stub;

pub use health::{health, queue_status, socket_health};
pub use intake::insert_new_announcement;
