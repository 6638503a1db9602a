pub mod auth_service;
pub mod rate_limit;
pub mod request_mapper;
pub mod version_gate;
