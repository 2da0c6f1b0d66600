//! LLM Deployer Library
//!
//! Turns a task brief into a published static site: generate the page,
//! reconcile it into a hosted repository, publish it and report back.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod generate;
pub mod hosting;
pub mod http;
pub mod logs;
pub mod models;
pub mod notify;
pub mod server;
pub mod utils;
