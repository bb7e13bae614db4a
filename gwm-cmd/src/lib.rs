//! Command implementations for the groundwater monitoring CLI.
//!
//! Every command runs against an [`Orchestrator`](gwm_query::Orchestrator)
//! built from the loaded settings: the PostgREST backend by default, or a
//! directory of CSV tables with `--offline`.

use clap::{Args, Subcommand, ValueEnum};
use gwm_core::{Region, Variable};
use std::path::PathBuf;

pub mod cache;
pub mod context;
pub mod query;

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Settings file (defaults to ./gwm.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override backend.url
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Override cache.path (SQLite file)
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,

    /// Serve tables from `<DIR>/<table>.csv` instead of the backend
    #[arg(long, global = true, value_name = "DIR")]
    pub offline: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Monitoring points of a variable, one row per point
    Points {
        /// depth, nitrate, conductivity, flow or meteo
        #[arg(short, long)]
        variable: Variable,

        /// Aquifer system / basin label; all regions when omitted
        #[arg(short, long, default_value = "all")]
        region: Region,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Region labels available for a variable
    Regions {
        #[arg(short, long)]
        variable: Variable,
    },

    /// All observations of one monitoring point, oldest first
    History {
        #[arg(short, long)]
        variable: Variable,

        /// Monitoring point code
        #[arg(short, long)]
        code: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Remove cached entries
    Clear {
        /// Only keys starting with this prefix, e.g. `var_points_v1:`
        #[arg(long)]
        prefix: Option<String>,
    },

    /// List cached keys with their age
    List,
}

pub async fn run(global: GlobalArgs, command: Command) -> anyhow::Result<()> {
    let context = context::Context::build(&global)?;
    match command {
        Command::Points {
            variable,
            region,
            format,
            output,
        } => query::run_points(&context, variable, &region, format, output.as_deref()).await,
        Command::Regions { variable } => query::run_regions(&context, variable).await,
        Command::History {
            variable,
            code,
            format,
            output,
        } => query::run_history(&context, variable, &code, format, output.as_deref()).await,
        Command::Cache { action } => match action {
            CacheAction::Clear { prefix } => cache::run_clear(&context, prefix.as_deref()),
            CacheAction::List => cache::run_list(&context),
        },
    }
}
