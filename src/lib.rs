//! Emulated lab network with iperf measurements and readable reports.
//!
//! The parsing core ([`parser`], [`format`], [`models`]) is pure and holds no
//! state. The rest drives the network and serves the HTTP endpoints.

pub mod config;
pub mod error;
pub mod format;
pub mod iperf;
pub mod models;
pub mod parser;
pub mod runner;
pub mod server;
pub mod session;
pub mod topology;

pub use models::domain::Protocol;
pub use models::dto::ParsedRecord;
pub use parser::{parse_iperf_output, parse_records};
