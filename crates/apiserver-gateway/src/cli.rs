use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "apiserver-gateway",
    version,
    about = "TLS-terminating gateway for a Kubernetes-style API server"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen address (overrides config file setting)
    #[arg(long)]
    pub listen: Option<String>,

    /// Backend API server host (overrides config file setting)
    #[arg(long)]
    pub backend_host: Option<String>,

    /// Expected Origin for WebSocket upgrades (overrides config file setting)
    #[arg(long)]
    pub origin: Option<String>,

    /// TLS certificate path (overrides config file setting)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key path (overrides config file setting)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}
