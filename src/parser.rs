// iperf -y C report lines:
// timestamp,src_ip,src_port,dest_ip,dest_port,id,interval,transfer,bandwidth[,jitter,lost,total,pct,ooo]

use tracing::debug;

use crate::format::{format_bandwidth, format_interval, format_timestamp, format_transfer};
use crate::models::domain::{LossPercentage, Protocol};
use crate::models::dto::{ParsedRecord, TcpRecord, UdpRecord};

/// A TCP report line checked to hold at least the eight mandatory fields.
struct TcpFields<'a> {
    fields: [&'a str; 8],
    bandwidth: Option<&'a str>,
}

impl<'a> TcpFields<'a> {
    fn from_line(fields: &[&'a str]) -> Option<Self> {
        let head = fields.get(..8)?;
        Some(TcpFields {
            fields: head.try_into().ok()?,
            bandwidth: fields.get(8).copied(),
        })
    }

    fn record(&self) -> TcpRecord {
        let bandwidth = match self.bandwidth {
            Some(raw) => format_bandwidth(raw),
            None => "N/A".to_string(),
        };
        base_record(&self.fields, bandwidth)
    }
}

/// A UDP report line checked to hold at least twelve fields.
struct UdpFields<'a> {
    fields: [&'a str; 12],
}

impl<'a> UdpFields<'a> {
    fn from_line(fields: &[&'a str]) -> Option<Self> {
        let head = fields.get(..12)?;
        Some(UdpFields {
            fields: head.try_into().ok()?,
        })
    }

    fn record(&self) -> UdpRecord {
        let f = &self.fields;
        let base = base_record(&[f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7]], format_bandwidth(f[8]));
        // Loss is measured against field 7.
        let loss = LossPercentage::compute(f[7], f[10]);

        UdpRecord {
            base,
            jitter_ms: format!("{} ms", f[9]),
            packet_loss: f[10].to_string(),
            packet_loss_percentage: loss.to_string(),
            loss_valid: loss.valid,
        }
    }
}

fn base_record(f: &[&str; 8], bandwidth: String) -> TcpRecord {
    TcpRecord {
        timestamp: format_timestamp(f[0]),
        src_ip: f[1].to_string(),
        src_port: f[2].to_string(),
        dest_ip: f[3].to_string(),
        dest_port: f[4].to_string(),
        id: f[5].to_string(),
        interval: format_interval(f[6]),
        transfer: format_transfer(f[7]),
        bandwidth,
    }
}

/// Parses one report line. Lines too short for `protocol` come back empty.
pub fn parse_line(line: &str, protocol: Protocol) -> ParsedRecord {
    let fields: Vec<&str> = line.split(',').collect();

    let record = match protocol {
        Protocol::Tcp => TcpFields::from_line(&fields).map(|f| ParsedRecord::Tcp(f.record())),
        Protocol::Udp => UdpFields::from_line(&fields).map(|f| ParsedRecord::Udp(f.record())),
    };

    record.unwrap_or_else(|| {
        debug!(
            protocol = %protocol,
            fields = fields.len(),
            needed = protocol.min_fields(),
            "report line too short"
        );
        ParsedRecord::empty()
    })
}

/// Parses a whole report, one record per line of the trimmed text.
///
/// With no protocol every line yields an empty record. Blank text is a
/// single empty line and yields one empty record.
pub fn parse_records(output: &str, protocol: Option<Protocol>) -> Vec<ParsedRecord> {
    output
        .trim()
        .split('\n')
        .map(|line| match protocol {
            Some(protocol) => parse_line(line, protocol),
            None => ParsedRecord::empty(),
        })
        .collect()
}

/// Same as [`parse_records`] but takes the protocol as its wire tag
/// (`"TCP"` or `"UDP"`). Any other tag gives empty records.
pub fn parse_iperf_output(output: &str, protocol: &str) -> Vec<ParsedRecord> {
    let protocol = match protocol.parse::<Protocol>() {
        Ok(protocol) => Some(protocol),
        Err(e) => {
            debug!("{e}");
            None
        }
    };
    parse_records(output, protocol)
}
