// Library exports for the mailbot crate
// This allows the binary and the integration tests to share the modules

pub mod classifier;
pub mod command;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod email;
pub mod error;
pub mod printer;
pub mod reporter;
