use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackd")]
#[command(about = "Local backend stack provisioning", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision a project stack and wait for it to become healthy
    Provision {
        /// Numeric project id (drives deterministic port allocation)
        #[arg(long)]
        project_id: u32,
        /// Project reference slug
        #[arg(long = "ref")]
        project_ref: String,
        /// Human-readable project name
        #[arg(long)]
        name: String,
        /// Owning organization slug
        #[arg(long, default_value = "local-org")]
        org: String,
        /// Target cloud provider label
        #[arg(long, default_value = "LOCAL")]
        cloud_provider: String,
        /// Target region label
        #[arg(long, default_value = "local")]
        region: String,
        /// Generated database credential for the stack
        #[arg(long, env = "STACKD_DB_PASSWORD")]
        db_password: String,
        /// Database version the stack should run
        #[arg(long, default_value = "15")]
        db_version: String,
        /// Project root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Optional services to leave out of the stack (comma-separated;
        /// unknown names are ignored)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Ask the runtime agent to stop a project's stack
    Stop {
        /// Project reference slug
        #[arg(long = "ref")]
        project_ref: String,
        /// Project root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Tear a project's stack down and forget its runtime record
    Destroy {
        /// Numeric project id
        #[arg(long)]
        project_id: u32,
        /// Project reference slug
        #[arg(long = "ref")]
        project_ref: String,
        /// Owning organization slug
        #[arg(long, default_value = "local-org")]
        org: String,
        /// Project root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Print the deterministic port block for a project id
    Ports {
        /// Numeric project id
        project_id: u32,
    },
}
