// CLI layer - argument parsing and report rendering.
// Nothing in here talks to Notion or Google; main.rs wires those up.

pub mod args;
pub mod report;

pub use args::Cli;
