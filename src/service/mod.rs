//! Service layer module

pub mod sign_service;
pub mod types;

pub use sign_service::{classify_frame, SignService};
pub use types::*;
