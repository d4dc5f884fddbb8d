//! Configuration of a key generation or resharing run.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::structs::{find_pub, DistKeyShare, Index, Node};
use crate::group::Group;
use crate::sign::{Schnorr, Scheme};
use crate::sponge::SpongeCipher;
use crate::suite::Suite;
use crate::trace::Tracer;
use crate::vss::{minimum_t, valid_t};

/// Length of the session nonce in bytes.
pub const NONCE_LENGTH: usize = 32;

/// A fresh session nonce drawn from the operating system.
pub fn get_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Represents the parameters of the t-of-n threshold scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Number of parties
    pub n: usize,
    /// Threshold
    pub t: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum ParametersError {
    /// Number of parties is invalid
    InvalidNumberOfParties,
    /// Threshold is invalid
    InvalidThreshold,
    /// Threshold is greater than the number of parties
    ThresholdGreaterThanParties,
}

impl Parameters {
    /// Create a new set of parameters
    pub fn new(n: usize, t: usize) -> Self {
        Self { n, t }
    }

    /// Validate the parameters
    pub fn validate(&self) -> Result<(), ParametersError> {
        if self.n == 0 || u32::try_from(self.n).is_err() {
            return Err(ParametersError::InvalidNumberOfParties);
        }
        if self.t == 0 {
            return Err(ParametersError::InvalidThreshold);
        }
        if self.t > self.n {
            return Err(ParametersError::ThresholdGreaterThanParties);
        }
        Ok(())
    }
}

/// Reasons a [`Config`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum ConfigError {
    /// can't run with an empty node list
    EmptyNodeList,
    /// nonce has {0} bytes, expected 32
    InvalidNonceLength(usize),
    /// an authentication scheme is required
    MissingAuth,
    /// index {0} appears twice in the same node list
    DuplicateIndex(Index),
    /// public key not found in the old or the new node list
    NotAParticipant,
    /// resharing needs the old node list
    MissingOldNodes,
    /// resharing needs the old threshold
    MissingOldThreshold,
    /// a new node can't receive shares without the previous public polynomial
    MissingPublicCoeffs,
    /// previous public polynomial has {got} coefficients, expected {expected}
    PublicCoeffsMismatch {
        /// Old threshold
        expected: usize,
        /// Coefficients supplied
        got: usize,
    },
    /// threshold {t} is invalid for {n} nodes
    InvalidThreshold {
        /// Requested threshold
        t: usize,
        /// Size of the node list
        n: usize,
    },
    /// invalid parameters: {0}
    Parameters(#[from] ParametersError),
}

/// Everything a node needs to take part in a run.
///
/// A fresh key generation only needs `new_nodes`; every node deals and receives. A resharing also
/// needs `old_nodes` and `old_threshold`, plus the current `share` on old nodes and the previous
/// `public_coeffs` on nodes that join.
pub struct Config<S: Suite> {
    pub suite: S,
    /// Long-term private key of this node.
    pub longterm: S::Scalar,
    /// Dealers of a resharing. A fresh run copies `new_nodes` here.
    pub old_nodes: Vec<Node<S>>,
    /// Commitments of the distributed polynomial being reshared.
    pub public_coeffs: Option<Vec<S::Element>>,
    /// Holders of the shares produced by this run.
    pub new_nodes: Vec<Node<S>>,
    /// Current share of an old node in a resharing.
    pub share: Option<DistKeyShare<S>>,
    /// Threshold of the new group. Zero picks [`minimum_t`] of the new group size.
    pub threshold: usize,
    /// Threshold of the old group, required when resharing.
    pub old_threshold: usize,
    /// Extra randomness for the secret coefficient.
    pub reader: Option<Box<dyn RngCore + Send>>,
    /// Use `reader` alone instead of mixing it with the operating system source.
    pub user_reader_only: bool,
    /// Holders send explicit approvals so a run can finish without waiting for timeouts.
    pub fast_sync: bool,
    /// Session nonce, unique per run.
    pub nonce: Vec<u8>,
    /// Scheme signing every bundle.
    pub auth: Option<Arc<dyn Scheme<S>>>,
    pub tracer: Option<Box<dyn Tracer>>,
}

impl<S: Suite> fmt::Debug for Config<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("suite", &self.suite)
            .field("longterm", &"<redacted>")
            .field("old_nodes", &self.old_nodes)
            .field("new_nodes", &self.new_nodes)
            .field("public_coeffs", &self.public_coeffs)
            .field("share", &self.share)
            .field("threshold", &self.threshold)
            .field("old_threshold", &self.old_threshold)
            .field("fast_sync", &self.fast_sync)
            .field("nonce", &hex::encode(&self.nonce))
            .finish_non_exhaustive()
    }
}

impl<S: Suite> Config<S> {
    /// Configuration of a fresh run among `nodes`, signing bundles with Schnorr signatures.
    pub fn new_dkg(suite: S, longterm: S::Scalar, nodes: Vec<Node<S>>, threshold: usize, nonce: Vec<u8>) -> Self {
        let auth: Arc<dyn Scheme<S>> = Arc::new(Schnorr::new(suite.clone()));
        Self {
            suite,
            longterm,
            old_nodes: Vec::new(),
            public_coeffs: None,
            new_nodes: nodes,
            share: None,
            threshold,
            old_threshold: 0,
            reader: None,
            user_reader_only: false,
            fast_sync: false,
            nonce,
            auth: Some(auth),
            tracer: None,
        }
    }

    /// Configuration of a resharing from `old_nodes` to `new_nodes`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_reshare(
        suite: S,
        longterm: S::Scalar,
        old_nodes: Vec<Node<S>>,
        old_threshold: usize,
        new_nodes: Vec<Node<S>>,
        threshold: usize,
        share: Option<DistKeyShare<S>>,
        public_coeffs: Option<Vec<S::Element>>,
        nonce: Vec<u8>,
    ) -> Self {
        let mut config = Self::new_dkg(suite, longterm, new_nodes, threshold, nonce);
        config.old_nodes = old_nodes;
        config.old_threshold = old_threshold;
        config.share = share;
        config.public_coeffs = public_coeffs;
        config
    }

    pub fn with_fast_sync(mut self, fast_sync: bool) -> Self {
        self.fast_sync = fast_sync;
        self
    }

    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Some(Box::new(tracer));
        self
    }

    /// Long-term public key of this node.
    pub fn public(&self) -> S::Element {
        self.suite.base_mul(&self.longterm)
    }

    pub fn is_resharing(&self) -> bool {
        self.share.is_some() || self.public_coeffs.is_some()
    }

    /// Threshold of the new group, after applying the default.
    pub fn new_threshold(&self) -> usize {
        if self.threshold == 0 {
            minimum_t(self.new_nodes.len())
        } else {
            self.threshold
        }
    }

    pub fn parameters(&self) -> Parameters {
        Parameters::new(self.new_nodes.len(), self.new_threshold())
    }

    /// Nodes that deal in this run.
    pub fn dealers(&self) -> &[Node<S>] {
        if self.is_resharing() {
            &self.old_nodes
        } else {
            &self.new_nodes
        }
    }

    /// Checks the configuration before a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.new_nodes.is_empty() {
            return Err(ConfigError::EmptyNodeList);
        }
        if self.nonce.len() != NONCE_LENGTH {
            return Err(ConfigError::InvalidNonceLength(self.nonce.len()));
        }
        if self.auth.is_none() {
            return Err(ConfigError::MissingAuth);
        }
        for nodes in [&self.old_nodes, &self.new_nodes] {
            let mut seen = BTreeSet::new();
            if let Some(dup) = nodes.iter().find(|n| !seen.insert(n.index)) {
                return Err(ConfigError::DuplicateIndex(dup.index));
            }
        }

        let public = self.public();
        let in_new = find_pub(&self.new_nodes, &public).is_some();
        if !in_new && find_pub(&self.old_nodes, &public).is_none() {
            return Err(ConfigError::NotAParticipant);
        }

        let params = self.parameters();
        params.validate()?;
        if !valid_t(params.t, params.n) {
            return Err(ConfigError::InvalidThreshold { t: params.t, n: params.n });
        }

        if self.is_resharing() {
            if self.old_nodes.is_empty() {
                return Err(ConfigError::MissingOldNodes);
            }
            if self.old_threshold == 0 {
                return Err(ConfigError::MissingOldThreshold);
            }
            Parameters::new(self.old_nodes.len(), self.old_threshold).validate()?;
            if in_new {
                let coeffs = self
                    .public_coeffs
                    .as_deref()
                    .or_else(|| self.share.as_ref().map(|s| s.commitments()))
                    .ok_or(ConfigError::MissingPublicCoeffs)?;
                if coeffs.len() != self.old_threshold {
                    return Err(ConfigError::PublicCoeffsMismatch { expected: self.old_threshold, got: coeffs.len() });
                }
            }
        }
        Ok(())
    }

    /// The stream the secret coefficient is drawn from.
    pub(crate) fn random_stream(&mut self) -> SpongeCipher {
        let mut seed = Zeroizing::new(Vec::with_capacity(2 * NONCE_LENGTH));
        if self.reader.is_none() || !self.user_reader_only {
            let mut os = [0u8; NONCE_LENGTH];
            OsRng.fill_bytes(&mut os);
            seed.extend_from_slice(&os);
            zeroize::Zeroize::zeroize(&mut os);
        }
        if let Some(reader) = self.reader.as_mut() {
            let mut user = [0u8; NONCE_LENGTH];
            reader.fill_bytes(&mut user);
            seed.extend_from_slice(&user);
            zeroize::Zeroize::zeroize(&mut user);
        }
        self.suite.xof(&seed)
    }
}

impl<S: Suite> Drop for Config<S> {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.longterm);
    }
}
