//! Deployment module

pub mod fsm;
pub mod locks;
pub mod pages;
pub mod pipeline;
pub mod reconciler;
pub mod rounds;
pub mod validate;
