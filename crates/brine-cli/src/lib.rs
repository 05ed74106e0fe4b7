//! # brine-cli
//!
//! Host binary for a brine node: parses arguments, loads and overrides the
//! TOML configuration, sets up logging, binds the UDP transport, and runs the
//! gossip loop until Ctrl-C.

pub mod cli;

pub use cli::run;
