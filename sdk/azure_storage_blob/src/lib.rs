#![doc = include_str!("../README.md")]

pub mod append_blob;
pub mod blob;
pub mod block_blob;
pub mod client;
pub mod container;
pub mod lease;
pub mod models;
pub mod page_blob;
pub mod sas;
