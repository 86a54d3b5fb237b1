//! Running iperf clients and servers on the emulated network.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::IperfError;
use crate::models::domain::Protocol;
use crate::models::dto::ParsedRecord;
use crate::parser::parse_records;
use crate::session::NetworkSession;

const CONNECT_FAILURES: [&str; 2] = ["connect failed", "Connection refused"];

/// Kills processes named exactly `iperf`. Matching the full command line
/// (`-f`) would also hit this server, whose binary is `iperfnet`.
pub const KILL_IPERF: &str = "pkill -x iperf";

/// Body of a measurement request from the web UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IperfRequest {
    pub ip_dest: Option<String>,
    pub src_rate: Option<String>,
    pub l4_proto: Option<String>,
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IperfTarget {
    pub ip_dest: String,
    pub src_rate: String,
    pub protocol: Protocol,
}

impl IperfRequest {
    pub fn validate(&self) -> Result<IperfTarget, IperfError> {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        let (Some(ip_dest), Some(src_rate), Some(proto)) = (
            present(&self.ip_dest),
            present(&self.src_rate),
            present(&self.l4_proto),
        ) else {
            return Err(IperfError::MissingParameters);
        };

        let protocol = proto
            .parse::<Protocol>()
            .map_err(|_| IperfError::InvalidProtocol(proto.clone()))?;

        Ok(IperfTarget {
            ip_dest,
            src_rate,
            protocol,
        })
    }
}

pub fn client_command(protocol: Protocol, ip_dest: &str, rate: &str, duration: u64) -> String {
    match protocol {
        Protocol::Tcp => format!("iperf -c {ip_dest} -b {rate} -t {duration} -y C"),
        Protocol::Udp => format!("iperf -c {ip_dest} -u -b {rate} -t {duration} -y C"),
    }
}

pub fn server_command(protocol: Protocol, log_path: &Path) -> String {
    match protocol {
        Protocol::Tcp => format!("iperf -s -y C >> {}", log_path.display()),
        Protocol::Udp => format!("iperf -s -u -y C >> {}", log_path.display()),
    }
}

/// Runs one client from `source` towards the target and parses its report.
pub fn run_client(
    session: &NetworkSession,
    source: &str,
    target: &IperfTarget,
    duration: u64,
) -> Result<Vec<ParsedRecord>, IperfError> {
    let host = session.node(source)?;
    let command = client_command(target.protocol, &target.ip_dest, &target.src_rate, duration);

    info!(source, dest = %target.ip_dest, rate = %target.src_rate, protocol = %target.protocol, "starting iperf client");
    let output = host.cmd(&command)?;

    if CONNECT_FAILURES.iter().any(|marker| output.contains(marker)) {
        warn!(source, dest = %target.ip_dest, "iperf could not connect");
        return Err(IperfError::ConnectFailed(output));
    }

    Ok(parse_records(&output, Some(target.protocol)))
}

/// Kills any iperf process on `source`.
pub fn stop_clients(session: &NetworkSession, source: &str) -> Result<(), IperfError> {
    session.node(source)?.cmd(KILL_IPERF)?;
    Ok(())
}

/// Restarts an iperf server on every `h*` host, logging reports to
/// `<log_dir>/<host>_log.csv`.
pub fn restart_servers(
    session: &NetworkSession,
    protocol: Protocol,
    log_dir: &Path,
) -> Result<(), IperfError> {
    let nodes = session.hosts()?;
    let hosts: Vec<_> = nodes.iter().filter(|h| h.name().starts_with('h')).collect();

    for host in &hosts {
        host.cmd(KILL_IPERF)?;
    }
    session.reap();

    for host in &hosts {
        let log_path = log_dir.join(format!("{}_log.csv", host.name()));
        host.popen(&server_command(protocol, &log_path))?;
    }

    info!(%protocol, hosts = hosts.len(), "iperf servers restarted");
    Ok(())
}
