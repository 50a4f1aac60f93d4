#![doc = include_str!("../README.md")]

pub mod auth;
pub mod call;
pub mod client;
pub mod error;
pub mod operation;
pub mod pipeline;
pub mod request;
pub mod response;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use error::{ServiceError, ServiceResult};
