pub mod bundle_service;
pub mod catalog;
pub mod download;
pub mod fallback;
pub mod tracker;
