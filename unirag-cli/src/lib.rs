//! Command-line front end for `unirag`.
//!
//! ```text
//! unirag index  --project 1 --file passages.jsonl [--reset]
//! unirag search --project 1 --text "query" [--limit 10] [--threshold 0.5]
//! unirag answer --project 1 --text "query" [--limit N | --all] [--rerank] [--second-pass]
//! unirag info   --project 1
//! unirag reset  --project 1
//! ```
//!
//! Settings come from the environment (see [`unirag::settings`]), optionally
//! loaded from a `.env` file first.

pub mod commands;
pub mod logging;
pub mod passages;

pub use commands::{Cli, Command, build_orchestrator, execute, manage, run, run_with};
