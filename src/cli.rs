use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "regdiff")]
#[command(about = "Detect and classify changes between two versions of a regulatory document")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show added, deleted and modified sections
    Compare {
        /// Previous revision of the document
        #[arg(long)]
        old: PathBuf,

        /// New revision of the document
        #[arg(long)]
        new: PathBuf,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Compare two revisions and classify every change with the LLM backend
    Analyze {
        /// Previous revision of the document
        #[arg(long)]
        old: PathBuf,

        /// New revision of the document
        #[arg(long)]
        new: PathBuf,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report service and classification backend status
    Health,
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path, force } => {
                engine.init(path, force).await
            }
            Commands::Compare { old, new, format } => {
                engine.compare(&old, &new, &format).await
            }
            Commands::Analyze { old, new, output } => {
                engine.analyze(&old, &new, output).await
            }
            Commands::Health => {
                engine.health().await
            }
        }
    }
}
