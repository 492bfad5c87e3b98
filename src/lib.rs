//! Atelier — async image-generation job service.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod job;
pub mod store;
pub mod telemetry;
