pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod pipeline;
pub mod process;
pub mod schema;

pub use config::{Config, SourceMode};
pub use error::{ScrapeError, Stage};
pub use pipeline::{run, RunReport};
