//! CLI command implementations.

mod ask;
mod batch;
mod config;
mod doctor;
mod embed;
mod ingest;
mod search;
mod serve;

pub use ask::run_ask;
pub use batch::run_batch;
pub use config::run_config;
pub use doctor::run_doctor;
pub use embed::run_embed;
pub use ingest::run_ingest;
pub use search::run_search;
pub use serve::run_serve;
