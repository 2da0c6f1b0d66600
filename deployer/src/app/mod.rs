//! Application lifecycle and configuration

pub mod options;
pub mod run;
pub mod settings;
pub mod state;
