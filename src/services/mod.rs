pub mod auth_service;
pub mod fixture_service;
