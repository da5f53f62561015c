pub mod aggregate;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod error;
pub mod model;
pub mod parsers;
pub mod reconstruct;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod session;

pub use aggregate::{Aggregation, RankingEntry, aggregate};
pub use backend::{ProfilerBackend, ProtocolError, TracingBackend};
pub use config::Config;
pub use error::Degradation;
pub use parsers::{LoadedTrace, ParseError, parse_auto};
pub use report::Report;
pub use session::{
    Session, SessionError, SessionState, run_discovered_session, run_session, run_trace_session,
};
