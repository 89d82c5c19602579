pub mod classify;
pub mod cli;
pub mod config;
pub mod enhance;
pub mod errors;
pub mod failsafe;
pub mod log;
pub mod markup;
pub mod orchestrator;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod requirements;
pub mod scan;
pub mod ux;
pub mod wire;
