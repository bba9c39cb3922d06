//! Device test results service library.
//!
//! Runs mobile device test matrices on a remote testing service, turns their
//! execution steps and uploaded JUnit reports into dashboard views, and posts
//! step results back to CI.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
