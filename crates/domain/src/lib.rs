pub mod action;
pub mod ai;
pub mod aicall;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod message;
pub mod stream;
pub mod trace;

pub use error::{Error, Result};
