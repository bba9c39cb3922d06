//! SeaORM entity definitions for PostgreSQL database.

pub mod app;
pub mod build;
pub mod publish_job;
pub mod test_report;
pub mod test_report_asset;
