//! HTTP gateway in front of an S3-compatible object store.
//!
//! Clients upload through a spooled staging area, read images and
//! range-aware media through the gateway, and get presigned URLs for
//! everything else.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
