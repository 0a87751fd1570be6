//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    CatalogCommand, EditCommand, HistoryCommand, PipelinesCommand, RunCommand, ValidateCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Loan decision pipelines from the command line
#[derive(Debug, Parser, Clone)]
#[command(name = "loanflow")]
#[command(author = "loanflow contributors")]
#[command(version = "0.1.0")]
#[command(about = "Build loan decision pipelines and run applications through them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the history database
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Check a pipeline definition file
    Validate(ValidateCommand),

    /// Run an application through a pipeline
    Run(RunCommand),

    /// Edit a pipeline definition file
    Edit(EditCommand),

    /// Show the available step types
    Catalog(CatalogCommand),

    /// Store and list pipelines
    Pipelines(PipelinesCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
