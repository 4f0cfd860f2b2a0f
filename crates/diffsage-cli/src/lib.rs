// Library interface for diffsage-cli
// This allows integration tests to reach the argument parser and renderer.

pub mod args;
pub mod terminal;

pub use args::Cli;
pub use terminal::TerminalRenderer;
