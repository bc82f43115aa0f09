//! CLI 명령어 모듈.

pub mod fetch;
pub mod symbols;

pub use fetch::{run_fetch, run_fetch_now, FetchConfig};
pub use symbols::{render_symbols, OutputFormat};
