//! Episode persistence: a single SQLite table holding the reconciled
//! episode list, plus the read-only views the CLI renders.

mod episodes;
mod render;
mod schema;
mod types;

pub use render::render_table;
pub use schema::Database;
pub use types::{DatabaseError, Episode, START_TIME_FORMAT};
