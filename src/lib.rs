pub mod cli;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod service;
pub mod storage;
pub mod tasks;
