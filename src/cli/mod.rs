//! # CLI
//!
//! ```bash
//! # serve ./app on port 8080, reloading manifests on save
//! dio serve --root ./app --addr 0.0.0.0:8080 --watch
//!
//! # route table of the `post` controller, first match first
//! dio routes post --root ./app
//!
//! # load every manifest, exit non-zero if any is broken
//! dio check --root ./app
//! ```
//!
//! Settings come from `--config`, then `DIO_*` variables, then flags.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, AppArgs, Cli, Commands};
