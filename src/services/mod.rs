pub mod api;
pub mod data_service;
pub mod scheduler;
