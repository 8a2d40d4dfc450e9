// ABOUTME: Tether CLI support library
// ABOUTME: Key management and the shared provider/database context for commands

pub mod context;
pub mod keys;

pub use context::CliContext;
