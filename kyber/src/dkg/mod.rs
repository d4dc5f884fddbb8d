//! Pedersen distributed key generation and resharing.
//!
//! Every participant runs a [`DistKeyGenerator`] built from a [`Config`]. A fresh run creates a
//! new distributed secret; a resharing run hands the current secret of an old group over to a new
//! group, possibly with a different threshold, while keeping the public key. The state machine is
//! transport agnostic: [`protocol::Protocol`] drives it over any [`protocol::Board`].

/// Run configuration and its validation
pub mod config;

/// The per-node state machine
pub mod generator;

/// Event loop over a broadcast board
pub mod protocol;

/// Dealer by share holder statuses
pub mod status;

/// One-bundle-per-issuer sets
pub mod store;

/// Bundles, results and their wire encoding
pub mod structs;

pub use config::{get_nonce, Config, ConfigError, Parameters, ParametersError, NONCE_LENGTH};
pub use generator::{DistKeyGenerator, DkgError, Progress};
pub use protocol::{Board, ChannelBoard, Incoming, Phaser, Protocol, ProtocolOptions, TimePhaser};
pub use status::StatusMatrix;
pub use structs::{
    Deal, DealBundle, DistKeyShare, DkgResult, Index, Justification, JustificationBundle, Node, Packet, Phase,
    Response, ResponseBundle, Status,
};
