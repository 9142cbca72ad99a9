pub mod export_service;
pub mod parking_service;
