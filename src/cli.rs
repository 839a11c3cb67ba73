use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kubectl-cnpg-report")]
#[command(about = "Collect the logs of a PostgreSQL cluster's pods into a zip report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Namespace (defaults to "default" for clusters, "cnpg-system" for the operator)
    #[arg(short = 'n', long, global = true)]
    pub namespace: Option<String>,

    /// Context
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Output zip file (defaults to report_<kind>_<name>_<timestamp>.zip)
    #[arg(short = 'f', long, global = true)]
    pub file: Option<String>,

    /// Prefix each log line with its timestamp
    #[arg(long, global = true)]
    pub timestamps: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Logs of the cluster's pods and of the pods spawned by its jobs
    Cluster {
        /// Cluster name
        name: String,
    },
    /// Logs of the operator pods
    Operator,
}

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "cnpg-system";

impl Cli {
    pub fn effective_namespace(&self) -> &str {
        match (&self.namespace, &self.command) {
            (Some(ns), _) => ns.as_str(),
            (None, Command::Cluster { .. }) => DEFAULT_NAMESPACE,
            (None, Command::Operator) => DEFAULT_OPERATOR_NAMESPACE,
        }
    }
}
