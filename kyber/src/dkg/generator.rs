//! The key generation and resharing state machine of one node.
//!
//! A run goes through [`Phase::Deal`], [`Phase::Response`] and [`Phase::Justif`] before it is
//! [`Phase::Finish`]ed. Dealers (the old nodes, or everyone in a fresh run) share a random secret,
//! or their current share when resharing, with a polynomial of degree `t - 1`. Share holders (the
//! new nodes) check what they receive against the dealer's commitments and complain about bad or
//! missing shares. A dealer answers complaints by revealing the disputed shares. Misbehaving
//! parties are evicted locally and the run goes on without them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ark_std::{end_timer, start_timer};
use log::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use super::config::{Config, ConfigError};
use super::status::StatusMatrix;
use super::structs::{
    find_index, find_pub, is_included, Deal, DealBundle, DistKeyShare, DkgResult, Index, Justification,
    JustificationBundle, Packet, Phase, Response, ResponseBundle, Status,
};
use crate::ecies::{self, EciesError};
use crate::group::{Group, Scalar};
use crate::poly::{recover_commit, recover_secret, PolyError, PriPoly, PriShare, PubPoly, PubShare};
use crate::sign::{Scheme, SignatureError};
use crate::suite::Suite;
use crate::trace::Tracer;

/// Errors raised by a run of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum DkgError {
    /// only {all_good}/{threshold} valid deals, aborting
    NotEnoughValidDeals {
        /// Dealers whose shares were all accepted
        all_good: usize,
        /// Dealers needed
        threshold: usize,
    },
    /// this node was evicted
    Evicted,
    /// invalid configuration: {0}
    InvalidConfig(#[from] ConfigError),
    /// invalid bundle: {0}
    InvalidBundle(String),
    /// operation belongs to the {expected} phase but the run is in the {actual} phase
    InvalidPhase {
        /// Phase the operation needs
        expected: Phase,
        /// Phase the run is in
        actual: Phase,
    },
    /// only {qual} qualified share holders, {threshold} needed
    NotEnoughQualified {
        /// Qualified share holders
        qual: usize,
        /// Holders needed
        threshold: usize,
    },
    /// final share does not match the public polynomial
    InvalidShare,
    /// no share or public polynomial from dealer {0}
    MissingContribution(Index),
    /// this node does not deal in this run
    CannotIssue,
    /// the board or the phaser stopped before the run finished
    Interrupted,
    /// polynomial: {0}
    Poly(#[from] PolyError),
    /// signature: {0}
    Signature(#[from] SignatureError),
    /// encryption: {0}
    Ecies(#[from] EciesError),
}

/// What a node does after the response phase.
#[derive(Debug)]
pub enum Progress<G: Group> {
    /// The run is over. Nodes that only leave the group get no result.
    Finished(Option<DkgResult<G>>),
    /// Complaints are pending; broadcast the justifications, if this node has any.
    Justify(Option<JustificationBundle<G>>),
}

/// One node's view of a key generation or resharing run.
pub struct DistKeyGenerator<S: Suite> {
    config: Config<S>,
    auth: Arc<dyn Scheme<S>>,
    tracer: Option<Box<dyn Tracer>>,
    state: Phase,
    can_issue: bool,
    can_receive: bool,
    is_resharing: bool,
    /// Index in the old node list.
    dealer_index: Option<Index>,
    /// Index in the new node list.
    holder_index: Option<Index>,
    new_threshold: usize,
    old_threshold: usize,
    pri_poly: Option<PriPoly<S>>,
    pub_poly: Option<PubPoly<S>>,
    /// Commitments of the polynomial being reshared.
    old_pub_poly: Option<PubPoly<S>>,
    statuses: StatusMatrix,
    valid_shares: BTreeMap<Index, S::Scalar>,
    all_publics: BTreeMap<Index, PubPoly<S>>,
    evicted: BTreeSet<Index>,
    evicted_holders: BTreeSet<Index>,
}

impl<S: Suite> core::fmt::Debug for DistKeyGenerator<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DistKeyGenerator")
            .field("state", &self.state)
            .field("dealer_index", &self.dealer_index)
            .field("holder_index", &self.holder_index)
            .field("can_issue", &self.can_issue)
            .field("can_receive", &self.can_receive)
            .field("is_resharing", &self.is_resharing)
            .field("evicted", &self.evicted)
            .field("evicted_holders", &self.evicted_holders)
            .finish_non_exhaustive()
    }
}

impl<S: Suite> DistKeyGenerator<S> {
    /// Validates `config` and prepares this node's polynomial.
    pub fn new(mut config: Config<S>) -> Result<Self, DkgError> {
        config.validate()?;
        let auth = config.auth.clone().ok_or(ConfigError::MissingAuth)?;
        let mut tracer = config.tracer.take();
        tracer.protocol_begins();
        tracer.phase_begins(Phase::Init);

        let public = config.public();
        let is_resharing = config.is_resharing();
        let new_threshold = config.new_threshold();
        if !is_resharing {
            config.old_nodes = config.new_nodes.clone();
            config.old_threshold = new_threshold;
        }
        let old_threshold = config.old_threshold;
        let dealer_index = find_pub(&config.old_nodes, &public);
        let holder_index = find_pub(&config.new_nodes, &public);
        let can_receive = holder_index.is_some();

        let secret = match (&config.share, dealer_index) {
            _ if !is_resharing => None,
            (Some(share), Some(_)) => Some(share.share.value.clone()),
            _ => None,
        };
        let can_issue = !is_resharing || secret.is_some();
        let (pri_poly, pub_poly) = if can_issue {
            let mut stream = config.random_stream();
            let poly = PriPoly::new(config.suite.clone(), new_threshold, secret, &mut stream)?;
            let commits = poly.commit(None);
            (Some(poly), Some(commits))
        } else {
            (None, None)
        };

        let old_pub_poly = match (&config.public_coeffs, &config.share) {
            _ if !is_resharing || !can_receive => None,
            (Some(coeffs), _) => Some(PubPoly::new(config.suite.clone(), None, coeffs.clone())?),
            (None, Some(share)) => Some(PubPoly::new(config.suite.clone(), None, share.commits.clone())?),
            (None, None) => return Err(ConfigError::MissingPublicCoeffs.into()),
        };

        let dealers = config.old_nodes.iter().map(|n| n.index);
        let holders: Vec<Index> = config.new_nodes.iter().map(|n| n.index).collect();
        let statuses = if config.fast_sync {
            // every share is bad until its holder says otherwise
            StatusMatrix::new(dealers, &holders, Status::Complaint)
        } else {
            // shares are good unless someone complains, except the ones this node still waits for
            let mut statuses = StatusMatrix::new(dealers, &holders, Status::Success);
            if let Some(holder) = holder_index {
                for dealer in &config.old_nodes {
                    statuses.set(dealer.index, holder, Status::Complaint);
                }
            }
            statuses
        };

        debug!(
            "dkg node ready: dealer {dealer_index:?}, holder {holder_index:?}, t = {new_threshold}, resharing = {is_resharing}, fast sync = {}",
            config.fast_sync
        );
        Ok(Self {
            config,
            auth,
            tracer,
            state: Phase::Init,
            can_issue,
            can_receive,
            is_resharing,
            dealer_index,
            holder_index,
            new_threshold,
            old_threshold,
            pri_poly,
            pub_poly,
            old_pub_poly,
            statuses,
            valid_shares: BTreeMap::new(),
            all_publics: BTreeMap::new(),
            evicted: BTreeSet::new(),
            evicted_holders: BTreeSet::new(),
        })
    }

    pub fn state(&self) -> Phase {
        self.state
    }

    pub fn config(&self) -> &Config<S> {
        &self.config
    }

    pub fn can_issue(&self) -> bool {
        self.can_issue
    }

    pub fn can_receive(&self) -> bool {
        self.can_receive
    }

    pub fn is_resharing(&self) -> bool {
        self.is_resharing
    }

    pub fn dealer_index(&self) -> Option<Index> {
        self.dealer_index
    }

    pub fn holder_index(&self) -> Option<Index> {
        self.holder_index
    }

    pub fn threshold(&self) -> usize {
        self.new_threshold
    }

    pub fn statuses(&self) -> &StatusMatrix {
        &self.statuses
    }

    /// Dealers this node evicted.
    pub fn evicted(&self) -> &BTreeSet<Index> {
        &self.evicted
    }

    /// Share holders this node evicted.
    pub fn evicted_holders(&self) -> &BTreeSet<Index> {
        &self.evicted_holders
    }

    /// Number of response bundles that complete the response phase in fast sync mode.
    pub fn expected_responses_fast_sync(&self) -> usize {
        self.config.new_nodes.len()
    }

    /// Checks the signature of `packet` against the long-term key of its issuer.
    pub fn verify_packet_signature<P: Packet>(&self, packet: &P) -> Result<(), DkgError> {
        let nodes = if P::FROM_DEALER { &self.config.old_nodes } else { &self.config.new_nodes };
        let public = find_index(nodes, packet.index())
            .ok_or_else(|| DkgError::InvalidBundle(format!("no node with index {}", packet.index())))?;
        self.auth.verify(public, &packet.hash(), packet.signature())?;
        Ok(())
    }

    /// Produces the deal bundle of this node.
    pub fn deals(&mut self) -> Result<DealBundle<S>, DkgError> {
        if !self.can_issue {
            return Err(DkgError::CannotIssue);
        }
        self.expect_phase(Phase::Init)?;
        let timer = start_timer!(|| "dkg deals");
        let dealer = self.dealer_index.ok_or(DkgError::CannotIssue)?;
        let (poly, public) = match (&self.pri_poly, &self.pub_poly) {
            (Some(poly), Some(public)) => (poly, public),
            _ => return Err(DkgError::CannotIssue),
        };
        let suite = &self.config.suite;
        let mut rng = suite.random_stream();
        let mut deals = Vec::with_capacity(self.config.new_nodes.len());
        for node in &self.config.new_nodes {
            let share = poly.eval(node.index).value;
            if self.holder_index == Some(node.index) {
                // no need to encrypt to ourselves
                self.valid_shares.insert(dealer, share);
                self.all_publics.insert(dealer, public.clone());
                self.statuses.set(dealer, node.index, Status::Success);
                continue;
            }
            let plaintext = Zeroizing::new(share.to_bytes());
            let encrypted_share = ecies::encrypt(
                suite,
                self.auth.as_ref(),
                &self.config.longterm,
                &node.public,
                &self.config.nonce,
                &plaintext,
                &mut rng,
            )?;
            deals.push(Deal { share_index: node.index, encrypted_share });
        }
        drop(rng);

        let mut bundle = DealBundle {
            dealer_index: dealer,
            deals,
            public: public.commits().to_vec(),
            session_id: self.config.nonce.clone(),
            signature: Vec::new(),
        };
        bundle.signature = self.sign(&bundle)?;
        self.enter(Phase::Deal);
        end_timer!(timer);
        Ok(bundle)
    }

    /// Checks the deals addressed to this node and returns its complaints, or its approvals in
    /// fast sync mode. Nodes that only leave the group skip this phase.
    pub fn process_deals(&mut self, bundles: &[DealBundle<S>]) -> Result<Option<ResponseBundle>, DkgError> {
        let Some(holder) = self.holder_index else {
            if self.state == Phase::Deal {
                self.enter(Phase::Response);
            }
            return Ok(None);
        };
        self.expect_phase(if self.can_issue { Phase::Deal } else { Phase::Init })?;
        let timer = start_timer!(|| "dkg process deals");

        let mut seen = BTreeSet::new();
        for bundle in bundles {
            let dealer = bundle.dealer_index;
            if self.can_issue && Some(dealer) == self.dealer_index {
                continue;
            }
            let Some(dealer_public) = find_index(&self.config.old_nodes, dealer).cloned() else {
                self.evict_dealer(dealer, "unknown dealer index");
                continue;
            };
            if bundle.session_id != self.config.nonce {
                self.evict_dealer(dealer, "session id mismatch");
                continue;
            }
            if bundle.public.len() != self.new_threshold {
                self.evict_dealer(dealer, "public polynomial has the wrong length");
                continue;
            }
            if !seen.insert(dealer) {
                self.evict_dealer(dealer, "second deal bundle");
                continue;
            }
            self.tracer.bundle_received(Phase::Deal, dealer);

            let pub_poly = PubPoly::new(self.config.suite.clone(), None, bundle.public.clone())?;
            // a reshared polynomial must hide the dealer's current share
            let consistent = match &self.old_pub_poly {
                Some(old) if self.is_resharing => old.eval(dealer).value == *pub_poly.commit(),
                _ => true,
            };
            self.all_publics.insert(dealer, pub_poly.clone());

            for deal in &bundle.deals {
                if !is_included(&self.config.new_nodes, deal.share_index) {
                    self.evict_dealer(dealer, "deal for an unknown share holder");
                    break;
                }
                if deal.share_index != holder {
                    continue;
                }
                let share = match self.decrypt_share(&dealer_public, deal) {
                    Ok(share) => share,
                    Err(err) => {
                        debug!("holder {holder}: unreadable share from dealer {dealer}: {err}");
                        continue;
                    },
                };
                if self.config.suite.base_mul(&share) != pub_poly.eval(holder).value {
                    debug!("holder {holder}: share from dealer {dealer} does not match its commitments");
                    continue;
                }
                if !consistent {
                    debug!("holder {holder}: dealer {dealer} does not reshare its own share");
                    continue;
                }
                self.statuses.set(dealer, holder, Status::Success);
                self.valid_shares.insert(dealer, share);
            }
        }

        // a node in both lists always approves its own deal
        for dealer in &self.config.old_nodes {
            if let Some(index) = find_pub(&self.config.new_nodes, &dealer.public) {
                self.statuses.set(dealer.index, index, Status::Success);
            }
        }

        let mine = self.statuses.statuses_for_share(holder);
        let responses: Vec<Response> = self
            .config
            .old_nodes
            .iter()
            .filter(|node| !self.evicted.contains(&node.index))
            .filter_map(|node| match mine.get(&node.index) {
                Some(Status::Success) if self.config.fast_sync => {
                    Some(Response { dealer_index: node.index, status: Status::Success })
                },
                Some(Status::Success) => None,
                _ => Some(Response { dealer_index: node.index, status: Status::Complaint }),
            })
            .collect();

        let bundle = if responses.is_empty() {
            None
        } else {
            let mut bundle = ResponseBundle {
                share_index: holder,
                responses,
                session_id: self.config.nonce.clone(),
                signature: Vec::new(),
            };
            bundle.signature = self.sign(&bundle)?;
            Some(bundle)
        };
        self.enter(Phase::Response);
        end_timer!(timer);
        Ok(bundle)
    }

    /// Applies the responses of every holder.
    ///
    /// The run is finished when no complaint is left. Otherwise it moves to the justification
    /// phase and a dealer with complaints against it gets the justifications to broadcast.
    pub fn process_responses(&mut self, bundles: &[ResponseBundle]) -> Result<Progress<S>, DkgError> {
        self.expect_phase(Phase::Response)?;
        let timer = start_timer!(|| "dkg process responses");

        let mut seen = BTreeSet::new();
        for bundle in bundles {
            let holder = bundle.share_index;
            if self.can_receive && Some(holder) == self.holder_index {
                continue;
            }
            if !is_included(&self.config.new_nodes, holder) {
                self.evict_holder(holder, "unknown share holder index");
                continue;
            }
            if bundle.session_id != self.config.nonce {
                self.evict_holder(holder, "session id mismatch");
                continue;
            }
            let violation = bundle.responses.iter().find_map(|r| {
                if !is_included(&self.config.old_nodes, r.dealer_index) {
                    Some("response about an unknown dealer")
                } else if !self.config.fast_sync && r.status == Status::Success {
                    Some("approval outside of fast sync")
                } else {
                    None
                }
            });
            if let Some(reason) = violation {
                self.evict_holder(holder, reason);
                continue;
            }
            if !seen.insert(holder) {
                self.evict_holder(holder, "second response bundle");
                continue;
            }
            self.tracer.bundle_received(Phase::Response, holder);
            for r in &bundle.responses {
                self.statuses.set(r.dealer_index, holder, r.status);
            }
        }

        if self.config.fast_sync {
            let silent: Vec<Index> = self
                .config
                .new_nodes
                .iter()
                .map(|n| n.index)
                .filter(|i| Some(*i) != self.holder_index && !seen.contains(i))
                .collect();
            for holder in silent {
                self.evict_holder(holder, "no response in fast sync");
            }
        }

        // t complaints are enough to rebuild the dealer's polynomial
        let dealers: Vec<Index> = self.statuses.dealers().collect();
        for dealer in dealers {
            if !self.evicted.contains(&dealer)
                && self.statuses.complaints_except(dealer, &self.evicted_holders) >= self.new_threshold
            {
                self.evict_dealer(dealer, "too many complaints");
            }
        }
        self.check_not_evicted()?;

        if self.statuses.complete_success_except(&self.evicted, &self.evicted_holders) {
            end_timer!(timer);
            if !self.can_receive {
                self.enter(Phase::Finish);
                return Ok(Progress::Finished(None));
            }
            return self.compute_result().map(|r| Progress::Finished(Some(r)));
        }

        self.enter(Phase::Justif);
        let justifications = match (self.dealer_index, &self.pri_poly) {
            (Some(dealer), Some(poly)) if self.can_issue && !self.evicted.contains(&dealer) => {
                let complaints: Vec<Index> = self
                    .statuses
                    .statuses_of_dealer(dealer)
                    .map(|row| {
                        row.iter()
                            .filter(|(h, s)| !s.is_success() && !self.evicted_holders.contains(*h))
                            .map(|(h, _)| *h)
                            .collect()
                    })
                    .unwrap_or_default();
                let justifications: Vec<Justification<S>> = complaints
                    .iter()
                    .map(|h| Justification { share_index: *h, share: poly.eval(*h).value })
                    .collect();
                for h in complaints {
                    self.statuses.set(dealer, h, Status::Success);
                }
                Some((dealer, justifications)).filter(|(_, j)| !j.is_empty())
            },
            _ => None,
        };
        let bundle = match justifications {
            Some((dealer_index, justifications)) => {
                debug!("dealer {dealer_index}: justifying {} shares", justifications.len());
                let mut bundle = JustificationBundle {
                    dealer_index,
                    justifications,
                    session_id: self.config.nonce.clone(),
                    signature: Vec::new(),
                };
                bundle.signature = self.sign(&bundle)?;
                Some(bundle)
            },
            None => None,
        };
        end_timer!(timer);
        Ok(Progress::Justify(bundle))
    }

    /// Checks the revealed shares and computes the result. Nodes that only leave the group get
    /// no result.
    pub fn process_justifications(
        &mut self,
        bundles: &[JustificationBundle<S>],
    ) -> Result<Option<DkgResult<S>>, DkgError> {
        if !self.can_receive {
            self.enter(Phase::Finish);
            return Ok(None);
        }
        self.expect_phase(Phase::Justif)?;
        let timer = start_timer!(|| "dkg process justifications");

        let mut seen = BTreeSet::new();
        for bundle in bundles {
            let dealer = bundle.dealer_index;
            if self.can_issue && Some(dealer) == self.dealer_index {
                continue;
            }
            if !seen.insert(dealer) {
                self.evict_dealer(dealer, "second justification bundle");
                continue;
            }
            if !is_included(&self.config.old_nodes, dealer) {
                self.evict_dealer(dealer, "unknown dealer index");
                continue;
            }
            if self.evicted.contains(&dealer) {
                continue;
            }
            if bundle.session_id != self.config.nonce {
                self.evict_dealer(dealer, "session id mismatch");
                continue;
            }
            let Some(pub_poly) = self.all_publics.get(&dealer).cloned() else {
                self.evict_dealer(dealer, "justification without a deal");
                continue;
            };
            if let Some(old) = self.old_pub_poly.as_ref().filter(|_| self.is_resharing) {
                if old.eval(dealer).value != *pub_poly.commit() {
                    self.evict_dealer(dealer, "reshared polynomial does not hide the old share");
                    continue;
                }
            }
            let violation = bundle.justifications.iter().find_map(|j| {
                if !is_included(&self.config.new_nodes, j.share_index) {
                    Some("justification for an unknown share holder")
                } else if self.config.suite.base_mul(&j.share) != pub_poly.eval(j.share_index).value {
                    Some("justified share does not match the commitments")
                } else {
                    None
                }
            });
            if let Some(reason) = violation {
                self.evict_dealer(dealer, reason);
                continue;
            }
            self.tracer.bundle_received(Phase::Justif, dealer);
            for j in &bundle.justifications {
                self.statuses.set(dealer, j.share_index, Status::Success);
                if Some(j.share_index) == self.holder_index {
                    self.valid_shares.insert(dealer, j.share.clone());
                }
            }
        }

        self.check_not_evicted()?;
        let result = self.compute_result();
        end_timer!(timer);
        result.map(Some)
    }

    fn compute_result(&mut self) -> Result<DkgResult<S>, DkgError> {
        self.enter(Phase::Finish);
        for dealer in self.evicted.clone() {
            self.statuses.set_all(dealer, Status::Complaint);
        }
        let valid: Vec<Index> = self
            .config
            .old_nodes
            .iter()
            .map(|n| n.index)
            .filter(|d| self.statuses.all_true_except(*d, &self.evicted_holders))
            .collect();
        let target = if self.is_resharing { self.old_threshold } else { self.new_threshold };
        if valid.len() < target {
            warn!("only {}/{target} valid deals", valid.len());
            return Err(DkgError::NotEnoughValidDeals { all_good: valid.len(), threshold: target });
        }
        let holder = self.holder_index.ok_or(DkgError::CannotIssue)?;
        let result = if self.is_resharing { self.reshared_result(holder, &valid) } else { self.fresh_result(holder, &valid) };
        if let Ok(result) = &result {
            debug!("holder {holder}: finished with {} qualified nodes", result.qual.len());
        }
        result
    }

    fn contribution(&self, dealer: Index) -> Result<(&S::Scalar, &PubPoly<S>), DkgError> {
        match (self.valid_shares.get(&dealer), self.all_publics.get(&dealer)) {
            (Some(share), Some(public)) => Ok((share, public)),
            _ => Err(DkgError::MissingContribution(dealer)),
        }
    }

    /// Sum of the valid deals.
    fn fresh_result(&self, holder: Index, valid: &[Index]) -> Result<DkgResult<S>, DkgError> {
        let suite = &self.config.suite;
        let mut value = suite.scalar_zero();
        let mut public: Option<PubPoly<S>> = None;
        let mut qual = Vec::new();
        // dealers and holders are the same nodes here
        for node in self.config.old_nodes.iter().filter(|n| valid.contains(&n.index)) {
            if self.evicted_holders.contains(&node.index) {
                continue;
            }
            let (share, poly) = self.contribution(node.index)?;
            value = value.add(share);
            public = Some(match public {
                Some(acc) => acc.add(poly)?,
                None => poly.clone(),
            });
            qual.push(node.clone());
        }
        if qual.len() < self.new_threshold {
            return Err(DkgError::NotEnoughQualified { qual: qual.len(), threshold: self.new_threshold });
        }
        let public = public.ok_or(DkgError::NotEnoughQualified { qual: 0, threshold: self.new_threshold })?;
        let share = PriShare { index: holder, value };
        if !public.check(&share) {
            return Err(DkgError::InvalidShare);
        }
        Ok(DkgResult { qual, key: DistKeyShare { commits: public.into_commits(), share } })
    }

    /// Interpolation of the valid deals at zero, for the share and every commitment.
    fn reshared_result(&self, holder: Index, valid: &[Index]) -> Result<DkgResult<S>, DkgError> {
        let suite = &self.config.suite;
        let mut shares = Vec::with_capacity(valid.len());
        let mut polys = Vec::with_capacity(valid.len());
        for dealer in valid {
            let (share, poly) = self.contribution(*dealer)?;
            shares.push(PriShare { index: *dealer, value: share.clone() });
            polys.push((*dealer, poly));
        }
        let value = recover_secret(suite, &shares, self.old_threshold)?;
        shares.iter_mut().for_each(|s| s.value.zeroize());

        let mut commits = Vec::with_capacity(self.new_threshold);
        for i in 0..self.new_threshold {
            let points = polys
                .iter()
                .map(|(dealer, poly)| {
                    let value = poly.commits().get(i).cloned().ok_or_else(|| {
                        DkgError::InvalidBundle(format!("dealer {dealer} committed to fewer than {i} coefficients"))
                    })?;
                    Ok(PubShare { index: *dealer, value })
                })
                .collect::<Result<Vec<_>, DkgError>>()?;
            commits.push(recover_commit(suite, &points, self.old_threshold)?);
        }
        let public = PubPoly::new(suite.clone(), None, commits)?;
        let share = PriShare { index: holder, value };
        if !public.check(&share) {
            return Err(DkgError::InvalidShare);
        }

        // holders that misbehaved as dealers are not trusted either
        let cheaters: Vec<&S::Element> = self
            .config
            .old_nodes
            .iter()
            .filter(|n| self.evicted.contains(&n.index))
            .map(|n| &n.public)
            .collect();
        let qual: Vec<_> = self
            .config
            .new_nodes
            .iter()
            .filter(|n| !self.evicted_holders.contains(&n.index) && !cheaters.contains(&&n.public))
            .cloned()
            .collect();
        if qual.len() < self.new_threshold {
            return Err(DkgError::NotEnoughQualified { qual: qual.len(), threshold: self.new_threshold });
        }
        Ok(DkgResult { qual, key: DistKeyShare { commits: public.into_commits(), share } })
    }

    fn decrypt_share(&self, dealer: &S::Element, deal: &Deal<S>) -> Result<S::Scalar, DkgError> {
        let suite = &self.config.suite;
        let plaintext = ecies::decrypt(
            suite,
            self.auth.as_ref(),
            dealer,
            &self.config.longterm,
            &self.config.nonce,
            &deal.encrypted_share,
        )?;
        suite
            .scalar_from_bytes(&plaintext)
            .map_err(|e| DkgError::InvalidBundle(format!("share does not decode: {e}")))
    }

    fn sign(&self, packet: &impl Packet) -> Result<Vec<u8>, DkgError> {
        Ok(self.auth.sign(&self.config.longterm, &packet.hash())?)
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), DkgError> {
        if self.state != expected {
            return Err(DkgError::InvalidPhase { expected, actual: self.state });
        }
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        if self.state == phase {
            return;
        }
        debug!("dkg node {:?}/{:?}: {} -> {phase}", self.dealer_index, self.holder_index, self.state);
        self.state = phase;
        self.tracer.phase_begins(phase);
        if phase == Phase::Finish {
            self.tracer.protocol_ends();
        }
    }

    fn check_not_evicted(&mut self) -> Result<(), DkgError> {
        let evicted = if self.can_issue {
            self.dealer_index.is_some_and(|i| self.evicted.contains(&i))
        } else {
            self.holder_index.is_some_and(|i| self.evicted_holders.contains(&i))
        };
        if evicted {
            warn!("dkg node {:?}/{:?} was evicted", self.dealer_index, self.holder_index);
            self.enter(Phase::Finish);
            return Err(DkgError::Evicted);
        }
        Ok(())
    }

    fn evict_dealer(&mut self, dealer: Index, reason: &str) {
        if self.evicted.insert(dealer) {
            warn!("evicting dealer {dealer}: {reason}");
            self.tracer.evicted_dealer(dealer, reason);
        }
    }

    fn evict_holder(&mut self, holder: Index, reason: &str) {
        if self.evicted_holders.insert(holder) {
            warn!("evicting share holder {holder}: {reason}");
            self.tracer.evicted_holder(holder, reason);
        }
    }
}

impl<S: Suite> Drop for DistKeyGenerator<S> {
    fn drop(&mut self) {
        if let Some(poly) = self.pri_poly.as_mut() {
            poly.zeroize();
        }
        self.valid_shares.values_mut().for_each(Zeroize::zeroize);
    }
}
