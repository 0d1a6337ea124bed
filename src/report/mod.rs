//! Report renderers for scan results.
//!
//! - [`terminal`] — colored summary box and one dependency table per source;
//!   respects `--verbose` / `--quiet`.
//!
//! JSON output is the pretty-printed `Vec<SourceReport>` and needs no renderer.

pub mod terminal;
