//! HTTP API test suite.
//!
//! Runs the full `/api/v1` surface against in-memory stores, a scripted
//! testing service and a local file server standing in for object storage.
//!
//! Run with: cargo test --test api

mod test_helpers;

mod test_assets_flow;
mod test_health;
mod test_matrix_flow;
mod test_publish_flow;
mod test_reports_flow;
mod test_webhook_flow;
