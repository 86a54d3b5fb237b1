use std::path::PathBuf;

use clap::Parser;

use crate::server::RunSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "iperfnet")]
#[command(about = "Emulated lab network with an HTTP endpoint for iperf measurements")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "IPERFNET_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(long, env = "IPERFNET_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Host the iperf client runs on
    #[arg(long, env = "IPERFNET_SOURCE_HOST", default_value = "h1")]
    pub source_host: String,

    /// Length of each iperf run, in seconds
    #[arg(long, env = "IPERFNET_DURATION", default_value_t = 10)]
    pub duration: u64,

    /// Extra seconds to wait for iperf before giving up
    #[arg(long, env = "IPERFNET_TIMEOUT_GRACE", default_value_t = 15)]
    pub timeout_grace: u64,

    /// Directory for the iperf server CSV logs
    #[arg(long, env = "IPERFNET_LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Use namespaces and links that already exist instead of creating them
    #[arg(long, env = "IPERFNET_NO_PROVISION")]
    pub no_provision: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            source_host: self.source_host.clone(),
            duration: self.duration,
            timeout_grace: self.timeout_grace,
            log_dir: self.log_dir.clone(),
        }
    }
}
