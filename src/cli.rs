use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "exam-results",
    version,
    about = "Extract and sanitize student results from examination result notices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a single document; the first page error aborts the run.
    Parse(ParseArgs),
    /// Parse every PDF under a directory, resuming from the progress ledger.
    ParseAll(ParseAllArgs),
    Lookup(LookupArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CacheMode {
    Off,
    Memory,
    Disk,
}

impl CacheMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Memory => "memory",
            Self::Disk => "disk",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractorArgs {
    #[arg(long, default_value = "tabula.jar")]
    pub tabula_jar: PathBuf,

    #[arg(long, default_value = "java")]
    pub java_bin: PathBuf,

    #[arg(long, default_value = "pdftotext")]
    pub pdftotext_bin: PathBuf,

    #[arg(long, default_value = "pdfinfo")]
    pub pdfinfo_bin: PathBuf,

    #[arg(long, value_enum, default_value_t = CacheMode::Disk)]
    pub cache_mode: CacheMode,

    #[arg(long)]
    pub extract_cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long, default_value = ".cache/exam-results")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub extractors: ExtractorArgs,

    #[arg(long, default_value_t = false)]
    pub store: bool,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseAllArgs {
    #[arg(long, default_value = ".cache/exam-results")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub dir: PathBuf,

    #[command(flatten)]
    pub extractors: ExtractorArgs,

    #[arg(long)]
    pub ledger_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub jobs: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LookupArgs {
    #[arg(long, default_value = ".cache/exam-results")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub rollno: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/exam-results")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub ledger_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
