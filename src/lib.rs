//! Git LFS batch API server.
//!
//! Answers `POST /objects/batch` by handing out presigned S3 URLs so that
//! clients move object bytes directly to and from the bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
