use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ctf_format::FileFormat;

#[derive(Parser)]
#[command(
    name = "ctf",
    about = "Common transport format repositories and artifact sets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (TOML); falls back to $CTF_CONFIG
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List supported repository formats
    Formats,
    /// Create an empty repository
    Create(CreateArgs),
    /// Add blobs and a manifest or index to a repository
    Add(AddArgs),
    /// List namespaces, artifacts, and tags
    List(ListArgs),
    /// Print a stored manifest or index
    Describe(DescribeArgs),
    /// Write an artifact and everything it references into an artifact set
    Synthesize(SynthesizeArgs),
    /// Print the main-artifact digest of an artifact set
    Digest(DigestArgs),
    /// Copy an artifact between repositories
    Transfer(TransferArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    pub path: PathBuf,
    /// Repository format; defaults to the configured format
    #[arg(short, long)]
    pub format: Option<FileFormat>,
}

#[derive(Args)]
pub struct AddArgs {
    pub repo: PathBuf,
    /// Manifest or index JSON file
    pub artifact: PathBuf,
    /// Blobs referenced by the artifact
    #[arg(short, long = "blob")]
    pub blobs: Vec<PathBuf>,
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
    #[arg(short, long, default_value = "")]
    pub namespace: String,
    /// Artifact media type; read from the document when omitted
    #[arg(long)]
    pub media_type: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    pub repo: PathBuf,
    /// Restrict output to one namespace
    #[arg(short, long)]
    pub namespace: Option<String>,
}

#[derive(Args)]
pub struct DescribeArgs {
    pub repo: PathBuf,
    /// Tag or digest
    pub reference: String,
    #[arg(short, long, default_value = "")]
    pub namespace: String,
}

#[derive(Args)]
pub struct SynthesizeArgs {
    pub repo: PathBuf,
    /// Tag or digest
    pub reference: String,
    #[arg(short, long, default_value = "")]
    pub namespace: String,
    /// Destination file for the artifact set
    #[arg(short, long)]
    pub output: PathBuf,
    /// Archive format of the set (tar, tgz, tzst)
    #[arg(short, long, default_value = "tgz")]
    pub format: FileFormat,
}

#[derive(Args)]
pub struct DigestArgs {
    pub path: PathBuf,
    /// Media type of the set; inferred from the archive header when omitted
    #[arg(long)]
    pub media_type: Option<String>,
}

#[derive(Args)]
pub struct TransferArgs {
    pub source: PathBuf,
    /// Tag or digest
    pub reference: String,
    pub target: PathBuf,
    #[arg(long, default_value = "")]
    pub from_namespace: String,
    /// Target namespace; defaults to the source namespace
    #[arg(long)]
    pub to_namespace: Option<String>,
}
