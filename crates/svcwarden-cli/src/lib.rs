//! Library half of the `svcwarden` binary: argument parsing, configuration
//! loading and the status source wired into the supervisor.

pub mod parser;
pub mod source;

pub use parser::Cli;
pub use source::UptimeSource;
