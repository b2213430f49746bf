use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pipeline-metrics",
    version,
    about = "Normalize schema 1.0/2.0 pipeline metrics into a dashboard artifact"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Build(BuildArgs),
    Inspect(InspectArgs),
    Validate(ValidateArgs),
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[arg(long, default_value = ".cache/pipeline-metrics")]
    pub cache_root: PathBuf,

    /// Metrics file or directory of `*.json` files; defaults to `<cache-root>/inputs`.
    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,

    #[arg(long)]
    pub source_registry_path: Option<PathBuf>,

    /// Replaces the builtin metric descriptions.
    #[arg(long)]
    pub semantics_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Exit non-zero when any record was rejected.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, default_value = ".cache/pipeline-metrics")]
    pub cache_root: PathBuf,

    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,

    #[arg(long)]
    pub source_registry_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = ".cache/pipeline-metrics")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub artifact_path: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = ".cache/pipeline-metrics")]
    pub cache_root: PathBuf,

    #[arg(long = "artifact", required = true)]
    pub artifacts: Vec<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}
