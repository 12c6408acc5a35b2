//! Student Wall client core.
//!
//! - [`session`]: delegated-identity lifecycle and the shared [`Session`]
//! - [`gate`]: route guarding over session snapshots
//! - [`data`]: cached reads and invalidating writes against the wall service
//! - [`client`]: wiring of the above with start/shutdown

pub mod client;
pub mod config;
pub mod data;
pub mod gate;
pub mod identity;
pub mod invalidation;
pub mod nav;
pub mod pager;
pub mod queries;
pub mod service;
pub mod session;
pub mod telemetry;

pub use client::WallClient;
pub use config::{CacheConfig, ClientConfig, ConfigError, Network, PolicyOverride};
pub use data::{DataAccess, VoteMap, VoteOutcome};
pub use gate::{AccessGate, GateDecision, RoutePolicy};
pub use identity::{DelegatedIdentity, IdentityOptions, IdentityProvider};
pub use invalidation::Mutation;
pub use nav::Route;
pub use pager::{Feed, Pager};
pub use queries::{QueryFamily, QueryPolicies};
pub use service::{ServiceConnector, WallService};
pub use session::{LoginOutcome, Session, SessionManager, SessionPhase};
