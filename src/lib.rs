// library crate for fieldlogic
// exposes the engine to embedders and modules needed by auxiliary binaries (e.g., generate-man)

pub mod cli;
pub mod config;
pub mod engine;
pub mod form;
pub mod logging;
pub mod logic;
