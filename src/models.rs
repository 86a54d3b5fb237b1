pub mod domain {
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    /// Transport protocol an iperf run was made with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum Protocol {
        #[serde(rename = "TCP")]
        Tcp,
        #[serde(rename = "UDP")]
        Udp,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("unknown protocol tag: {0:?}")]
    pub struct UnknownProtocol(pub String);

    impl Protocol {
        pub fn as_str(&self) -> &'static str {
            match self {
                Protocol::Tcp => "TCP",
                Protocol::Udp => "UDP",
            }
        }

        /// Fewest comma separated fields a report line needs under this protocol.
        pub fn min_fields(&self) -> usize {
            match self {
                Protocol::Tcp => 8,
                Protocol::Udp => 12,
            }
        }
    }

    impl FromStr for Protocol {
        type Err = UnknownProtocol;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "TCP" => Ok(Protocol::Tcp),
                "UDP" => Ok(Protocol::Udp),
                other => Err(UnknownProtocol(other.to_string())),
            }
        }
    }

    impl fmt::Display for Protocol {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Packet loss of a UDP run, in percent.
    ///
    /// `valid` is false when the counters were not numeric or the total was
    /// zero; `value` is then 0.0 and still renders as `0.00%`.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct LossPercentage {
        pub value: f64,
        pub valid: bool,
    }

    impl LossPercentage {
        pub fn compute(total: &str, lost: &str) -> Self {
            let counters = total
                .trim()
                .parse::<i64>()
                .and_then(|t| lost.trim().parse::<i64>().map(|l| (t, l)));

            match counters {
                Ok((total, lost)) if total > 0 => LossPercentage {
                    value: lost as f64 / total as f64 * 100.0,
                    valid: true,
                },
                _ => LossPercentage {
                    value: 0.0,
                    valid: false,
                },
            }
        }
    }

    impl fmt::Display for LossPercentage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:.2}%", self.value)
        }
    }
}

pub mod dto {
    use serde::Serialize;

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct TcpRecord {
        pub timestamp: String,
        pub src_ip: String,
        pub src_port: String,
        pub dest_ip: String,
        pub dest_port: String,
        pub id: String,
        pub interval: String,
        pub transfer: String,
        pub bandwidth: String,
    }

    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct UdpRecord {
        #[serde(flatten)]
        pub base: TcpRecord,
        pub jitter_ms: String,
        pub packet_loss: String,
        pub packet_loss_percentage: String,
        #[serde(skip)]
        pub loss_valid: bool,
    }

    /// Serializes as `{}`.
    #[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
    pub struct EmptyRecord {}

    /// One line of iperf report output, made readable.
    #[derive(Debug, Serialize, Clone, PartialEq)]
    #[serde(untagged)]
    pub enum ParsedRecord {
        Tcp(TcpRecord),
        Udp(UdpRecord),
        Empty(EmptyRecord),
    }

    impl ParsedRecord {
        pub fn empty() -> Self {
            ParsedRecord::Empty(EmptyRecord {})
        }

        pub fn is_empty(&self) -> bool {
            matches!(self, ParsedRecord::Empty(_))
        }

        /// Fields shared by both protocol shapes, if the record has any.
        pub fn base(&self) -> Option<&TcpRecord> {
            match self {
                ParsedRecord::Tcp(record) => Some(record),
                ParsedRecord::Udp(record) => Some(&record.base),
                ParsedRecord::Empty(_) => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::domain::{LossPercentage, Protocol};
    use super::dto::ParsedRecord;

    #[test]
    fn protocol_tags_are_exact() {
        assert_eq!("TCP".parse::<Protocol>(), Ok(Protocol::Tcp));
        assert_eq!("UDP".parse::<Protocol>(), Ok(Protocol::Udp));
        assert!("tcp".parse::<Protocol>().is_err());
        assert!("ICMP".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Udp.to_string(), "UDP");
    }

    #[test]
    fn loss_percentage_degenerates_to_zero() {
        assert_eq!(LossPercentage::compute("100", "5").to_string(), "5.00%");

        let zero = LossPercentage::compute("0", "0");
        assert_eq!(zero.to_string(), "0.00%");
        assert!(!zero.valid);

        let junk = LossPercentage::compute("abc", "3");
        assert_eq!(junk.to_string(), "0.00%");
        assert!(!junk.valid);
    }

    #[test]
    fn empty_record_serializes_as_empty_object() {
        let json = serde_json::to_string(&ParsedRecord::empty()).unwrap();
        assert_eq!(json, "{}");
    }
}
