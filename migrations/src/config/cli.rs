//! CLI arguments for the diff engine
//!
//! A front-end embeds [`DiffArgs`] with `#[command(flatten)]` and overlays it
//! on the TOML file via [`Config::apply_args`](super::Config::apply_args).

use crate::casing::Casing;
use clap::Args;
use std::path::PathBuf;

/// Flags shared by `generate` and `push`
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct DiffArgs {
    /// Config file
    #[arg(short, long, env = "DRIFT_CONFIG", default_value = "drift.toml")]
    pub config: PathBuf,

    /// Database dialect (sqlite, postgresql, mysql, dsql)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Output directory for migrations
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Column name casing for source schemas
    #[arg(long, value_enum)]
    pub casing: Option<Casing>,

    /// Write `--> statement-breakpoint` between statements
    #[arg(long)]
    pub breakpoints: Option<bool>,

    /// Table globs; prefix with `!` to exclude
    #[arg(long = "tables-filter", value_delimiter = ',')]
    pub tables_filter: Vec<String>,

    /// Schema globs; prefix with `!` to exclude
    #[arg(long = "schema-filter", value_delimiter = ',')]
    pub schema_filter: Vec<String>,

    /// Apply lossy changes without asking
    #[arg(long)]
    pub force: bool,

    /// Always ask before applying
    #[arg(long)]
    pub strict: bool,

    /// Print every statement
    #[arg(short, long)]
    pub verbose: bool,
}
