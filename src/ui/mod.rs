//! Terminal front-end

pub mod cli;
pub mod display;

pub use cli::{Args, Cli, UserCommand};
pub use display::TerminalDisplay;
