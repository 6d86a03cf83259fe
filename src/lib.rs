//! oss2s3 - streaming bucket-to-bucket migration from OSS to S3

pub mod config;
pub mod core;
pub mod error;
pub mod migrate;
pub mod s3;
pub mod storage;

pub use config::Config;
pub use core::Core;
pub use error::MigrateError;
pub use migrate::{MigrationDriver, MigrationSettings, RunSummary};
