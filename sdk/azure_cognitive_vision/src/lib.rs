#![doc = include_str!("../README.md")]

pub mod analysis;
pub mod client;
pub mod domain;
pub mod models;
pub mod ocr;
pub mod text_recognition;
pub mod thumbnail;
