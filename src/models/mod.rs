//! Wire-level data model for the batch API.
//!
//! Every value here is request-scoped: decoded from one request, assembled
//! into one response, then dropped.

pub mod batch;
pub mod oid;
