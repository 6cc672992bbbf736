//! The dagnet node.
//!
//! Ties one network's store to the outside world:
//! - [`AdmissionController`] validates and commits transactions, parking
//!   orphans until their parents arrive
//! - [`DagHandle`] decodes gossip frames, answers peer requests and serves
//!   read queries
//! - peer [`Reputation`] decides whose publishes are ignored
//!
//! Configuration, logging and metrics live here too.

pub mod admission;
pub mod config;
pub mod error;
pub mod gossip;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod orphans;
pub mod reputation;
pub mod shutdown;

pub use admission::{AdmissionController, AdmissionOutcome, AdmissionReport, Effect, Source};
pub use config::{ConfigSource, JsonConfigSource, NodeConfig};
pub use error::NodeError;
pub use gossip::Gossip;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{DagHandle, DagNode, TransactionRequest};
pub use orphans::{InsertResult, Orphan, OrphanPool};
pub use reputation::{PenaltyReason, Reputation};
pub use shutdown::{ShutdownController, ShutdownSignal};
