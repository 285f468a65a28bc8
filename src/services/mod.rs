pub mod auth;
pub mod batch_service;
pub mod memory_gateway;
pub mod resolver;
pub mod storage;
