//! ASL Hand-Sign Recognition Library

pub mod config;
pub mod features;
pub mod classifier;
pub mod engine;
pub mod dataset;
pub mod training;
pub mod service;
pub mod api;

pub use config::Config;
