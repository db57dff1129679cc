//! Repository implementations for run file tables
//!
//! Read operations are generic over any SQLite executor so they work on a
//! pool as well as inside a transaction. Writes take a connection because
//! the store always runs them inside one.

pub mod config_repo;
pub mod meta_repo;
pub mod metric_repo;

pub use config_repo::{ConfigRepository, ConfigRow};
pub use meta_repo::MetaRepository;
pub use metric_repo::{MetricRepository, PointRow};
