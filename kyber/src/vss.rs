//! Pedersen verifiable secret sharing.
//!
//! A [`Dealer`] shares a secret among `n` verifiers with a degree `t - 1` polynomial and publishes
//! commitments to its coefficients. Each verifier receives its share encrypted to its long-term
//! key, checks it against the commitments and broadcasts a signed [`Response`]. A complaint is
//! answered by a [`Justification`] that reveals the disputed deal to everyone. The
//! [`Aggregator`] each party keeps decides whether the deal is certified.

use std::collections::BTreeMap;

use rand_core::{CryptoRng, RngCore};
use sha2::Digest;
use zeroize::Zeroize;

use crate::ecies::{self, EciesError, EncryptedShare};
use crate::group::{Element, Group, Scalar};
use crate::marshal::{Decoder, Encoder, Marshal, MarshalError};
use crate::poly::{PolyError, PriPoly, PriShare, PubPoly};
use crate::sign::{Scheme, Schnorr, SignatureError};
use crate::suite::Suite;

/// Errors raised while dealing, verifying or aggregating a secret sharing.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum VssError {
    /// threshold {t} is invalid for {n} verifiers
    InvalidThreshold {
        /// Requested threshold
        t: usize,
        /// Number of verifiers
        n: usize,
    },
    /// deal threshold {got} does not match the expected {expected}
    IncompatibleThreshold {
        /// Threshold this aggregator works with
        expected: usize,
        /// Threshold carried by the deal
        got: usize,
    },
    /// the deal carries {got} commitments, expected {expected}
    InvalidCommitments {
        /// Threshold of the deal
        expected: usize,
        /// Commitments received
        got: usize,
    },
    /// a deal was already processed
    DealAlreadyProcessed,
    /// session id does not match
    SessionIdMismatch,
    /// index {0} is out of bounds
    IndexOutOfBounds(u32),
    /// deal is addressed to verifier {got}, this verifier is {expected}
    WrongIndex {
        /// Index of this verifier
        expected: u32,
        /// Index in the deal
        got: u32,
    },
    /// share does not verify against the commitments
    InvalidShare,
    /// public key not found in the list of verifiers
    NotAVerifier,
    /// a response from verifier {0} was already received
    DuplicateResponse(u32),
    /// no complaint was received for the justification of verifier {0}
    NoComplaint(u32),
    /// justification received for an approval of verifier {0}
    JustifiedApproval(u32),
    /// polynomial: {0}
    Poly(#[from] PolyError),
    /// signature: {0}
    Signature(#[from] SignatureError),
    /// encryption: {0}
    Ecies(#[from] EciesError),
    /// malformed deal: {0}
    Marshal(#[from] MarshalError),
}

/// The smallest threshold that keeps a sharing secure against a dishonest minority.
pub fn minimum_t(n: usize) -> usize {
    (n + 1) / 2
}

/// Whether `t` is an acceptable threshold for `n` verifiers.
pub fn valid_t(t: usize, n: usize) -> bool {
    t >= 2 && t >= minimum_t(n) && t <= n && u32::try_from(t).is_ok()
}

/// Hash of the dealer key, the verifiers, the commitments and the threshold.
pub fn session_id<S: Suite>(
    suite: &S,
    dealer: &S::Element,
    verifiers: &[S::Element],
    commitments: &[S::Element],
    t: usize,
) -> Result<Vec<u8>, VssError> {
    let t = u32::try_from(t).map_err(|_| VssError::InvalidThreshold { t, n: verifiers.len() })?;
    let mut h = suite.hash();
    h.update(dealer.to_bytes());
    for v in verifiers {
        h.update(v.to_bytes());
    }
    for c in commitments {
        h.update(c.to_bytes());
    }
    h.update(t.to_le_bytes());
    Ok(h.finalize().to_vec())
}

/// Encryption context binding a deal to its dealer and verifier set.
pub fn context<S: Suite>(suite: &S, dealer: &S::Element, verifiers: &[S::Element]) -> Vec<u8> {
    let mut h = suite.hash();
    h.update(b"vss-dealer");
    h.update(dealer.to_bytes());
    h.update(b"vss-verifiers");
    for v in verifiers {
        h.update(v.to_bytes());
    }
    h.finalize().to_vec()
}

/// The private share of one verifier along with the public commitments.
pub struct Deal<G: Group> {
    pub session_id: Vec<u8>,
    pub share: PriShare<G::Scalar>,
    pub commitments: Vec<G::Element>,
    pub t: u32,
}

impl<G: Group> Clone for Deal<G> {
    fn clone(&self) -> Self {
        Self {
            session_id: self.session_id.clone(),
            share: self.share.clone(),
            commitments: self.commitments.clone(),
            t: self.t,
        }
    }
}

impl<G: Group> PartialEq for Deal<G> {
    fn eq(&self, other: &Self) -> bool {
        self.session_id == other.session_id
            && self.share == other.share
            && self.commitments == other.commitments
            && self.t == other.t
    }
}

impl<G: Group> core::fmt::Debug for Deal<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Deal")
            .field("session_id", &hex::encode(&self.session_id))
            .field("index", &self.share.index)
            .field("commitments", &self.commitments)
            .field("t", &self.t)
            .finish_non_exhaustive()
    }
}

impl<G: Group> Marshal<G> for Deal<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.var_bytes(&self.session_id)?
            .u32(self.share.index)
            .scalar(&self.share.value)
            .u32(self.t)
            .len_u32(self.commitments.len())?;
        for c in &self.commitments {
            enc.element(c);
        }
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        let session_id = dec.var_bytes()?;
        let index = dec.u32()?;
        let value = dec.scalar()?;
        let t = dec.u32()?;
        let len = dec.len_u32()?;
        let commitments = (0..len).map(|_| dec.element()).collect::<Result<_, _>>()?;
        Ok(Self { session_id, share: PriShare { index, value }, commitments, t })
    }
}

impl<G: Group> Deal<G> {
    /// Transcript signed inside a justification.
    fn transcript(&self) -> Vec<u8> {
        let mut buf = b"deal".to_vec();
        buf.extend_from_slice(&self.session_id);
        buf.extend_from_slice(&self.share.index.to_le_bytes());
        buf.extend_from_slice(&self.share.value.to_bytes());
        buf
    }
}

impl<G: Group> Drop for Deal<G> {
    fn drop(&mut self) {
        self.share.value.zeroize();
    }
}

/// A verifier's signed verdict on the deal it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub session_id: Vec<u8>,
    /// Index of the verifier issuing the response
    pub index: u32,
    /// `true` for an approval, `false` for a complaint
    pub approved: bool,
    pub signature: Vec<u8>,
}

impl Response {
    fn transcript(&self) -> Vec<u8> {
        let mut buf = b"response".to_vec();
        buf.extend_from_slice(&self.session_id);
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.push(u8::from(!self.approved));
        buf
    }
}

impl<G: Group> Marshal<G> for Response {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.var_bytes(&self.session_id)?.u32(self.index).bool(self.approved).var_bytes(&self.signature)?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        Ok(Self { session_id: dec.var_bytes()?, index: dec.u32()?, approved: dec.bool()?, signature: dec.var_bytes()? })
    }
}

/// The dealer's answer to a complaint: the plaintext deal of the complaining verifier.
pub struct Justification<G: Group> {
    pub session_id: Vec<u8>,
    pub index: u32,
    pub deal: Deal<G>,
    pub signature: Vec<u8>,
}

impl<G: Group> Clone for Justification<G> {
    fn clone(&self) -> Self {
        Self {
            session_id: self.session_id.clone(),
            index: self.index,
            deal: self.deal.clone(),
            signature: self.signature.clone(),
        }
    }
}

impl<G: Group> PartialEq for Justification<G> {
    fn eq(&self, other: &Self) -> bool {
        self.session_id == other.session_id
            && self.index == other.index
            && self.deal == other.deal
            && self.signature == other.signature
    }
}

impl<G: Group> core::fmt::Debug for Justification<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Justification").field("index", &self.index).field("deal", &self.deal).finish_non_exhaustive()
    }
}

impl<G: Group> Justification<G> {
    fn transcript(&self) -> Vec<u8> {
        let mut buf = self.session_id.clone();
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&self.deal.transcript());
        buf
    }
}

/// Bookkeeping of the responses seen for one deal.
pub struct Aggregator<S: Suite> {
    suite: S,
    dealer: S::Element,
    verifiers: Vec<S::Element>,
    commits: Vec<S::Element>,
    responses: BTreeMap<u32, Response>,
    session_id: Vec<u8>,
    deal: Option<Deal<S>>,
    t: usize,
    bad_dealer: bool,
    timeout: bool,
}

impl<S: Suite> core::fmt::Debug for Aggregator<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Aggregator")
            .field("suite", &self.suite.name())
            .field("t", &self.t)
            .field("responses", &self.responses)
            .field("bad_dealer", &self.bad_dealer)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<S: Suite> Aggregator<S> {
    /// An aggregator that learns the commitments and threshold from the first deal it sees.
    pub fn empty(suite: S, dealer: S::Element, verifiers: Vec<S::Element>) -> Self {
        Self {
            suite,
            dealer,
            verifiers,
            commits: Vec::new(),
            responses: BTreeMap::new(),
            session_id: Vec::new(),
            deal: None,
            t: 0,
            bad_dealer: false,
            timeout: false,
        }
    }

    fn new(
        suite: S,
        dealer: S::Element,
        verifiers: Vec<S::Element>,
        commits: Vec<S::Element>,
        t: usize,
        session_id: Vec<u8>,
    ) -> Self {
        Self { commits, t, session_id, ..Self::empty(suite, dealer, verifiers) }
    }

    fn public(&self, index: u32) -> Result<&S::Element, VssError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.verifiers.get(i))
            .ok_or(VssError::IndexOutOfBounds(index))
    }

    /// Checks `deal` against the commitments.
    ///
    /// With `inclusion` set the deal is the one addressed to this party, and only one such deal
    /// is accepted. The first deal seen fixes the commitments, session id and threshold.
    pub fn verify_deal(&mut self, deal: &Deal<S>, inclusion: bool) -> Result<(), VssError> {
        if self.deal.is_some() && inclusion {
            return Err(VssError::DealAlreadyProcessed);
        }
        if self.deal.is_none() {
            self.commits = deal.commitments.clone();
            self.session_id = deal.session_id.clone();
            self.t = deal.t as usize;
            self.deal = Some(deal.clone());
        }

        let t = deal.t as usize;
        if !valid_t(t, self.verifiers.len()) {
            return Err(VssError::InvalidThreshold { t, n: self.verifiers.len() });
        }
        if t != self.t {
            return Err(VssError::IncompatibleThreshold { expected: self.t, got: t });
        }
        if deal.commitments.len() != t {
            return Err(VssError::InvalidCommitments { expected: t, got: deal.commitments.len() });
        }
        if self.session_id != deal.session_id {
            return Err(VssError::SessionIdMismatch);
        }
        self.public(deal.share.index)?;

        let poly = PubPoly::new(self.suite.clone(), None, deal.commitments.clone())?;
        if !poly.check(&deal.share) {
            return Err(VssError::InvalidShare);
        }
        Ok(())
    }

    /// Checks the origin and signature of `response` and records it.
    pub fn verify_response(&mut self, response: &Response) -> Result<(), VssError> {
        if !self.session_id.is_empty() && response.session_id != self.session_id {
            return Err(VssError::SessionIdMismatch);
        }
        let public = self.public(response.index)?;
        Schnorr::new(self.suite.clone()).verify(public, &response.transcript(), &response.signature)?;
        self.add_response(response.clone())
    }

    /// Checks a justification signed by the dealer and turns the matching complaint into an
    /// approval. A justification that does not hold flags the dealer as bad.
    pub fn verify_justification(&mut self, justification: &Justification<S>) -> Result<(), VssError> {
        let index = justification.index;
        self.public(index)?;
        match self.responses.get(&index) {
            None => return Err(VssError::NoComplaint(index)),
            Some(r) if r.approved => return Err(VssError::JustifiedApproval(index)),
            Some(_) => {},
        }
        Schnorr::new(self.suite.clone()).verify(
            &self.dealer,
            &justification.transcript(),
            &justification.signature,
        )?;
        if let Err(e) = self.verify_deal(&justification.deal, false) {
            log::warn!(target: "kyber::vss", "justification for verifier {index} does not hold: {e}");
            self.bad_dealer = true;
            return Err(e);
        }
        if let Some(r) = self.responses.get_mut(&index) {
            r.approved = true;
        }
        Ok(())
    }

    /// Records `response`, rejecting a second response from the same verifier.
    pub fn add_response(&mut self, response: Response) -> Result<(), VssError> {
        self.public(response.index)?;
        if self.responses.contains_key(&response.index) {
            return Err(VssError::DuplicateResponse(response.index));
        }
        self.responses.insert(response.index, response);
        Ok(())
    }

    pub fn enough_approvals(&self) -> bool {
        self.responses.values().filter(|r| r.approved).count() >= self.t
    }

    /// Whether the deal can be used.
    ///
    /// A certified deal has at least `t` approvals, no pending complaint and no bad
    /// justification. Before the timeout every verifier must have answered; after it, at most
    /// `n - t` may be missing.
    pub fn deal_certified(&self) -> bool {
        let mut absent = 0;
        let mut approvals = 0;
        let mut complaint = false;
        for i in 0..self.verifiers.len() {
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            match self.responses.get(&index) {
                None => absent += 1,
                Some(r) if r.approved => approvals += 1,
                Some(_) => complaint = true,
            }
        }
        let base = !self.bad_dealer && approvals >= self.t && !complaint;
        if self.timeout {
            base && absent <= self.verifiers.len().saturating_sub(self.t)
        } else {
            base && absent == 0
        }
    }

    /// Indexes of the verifiers that have not answered yet.
    pub fn missing_responses(&self) -> Vec<u32> {
        (0..self.verifiers.len())
            .filter_map(|i| u32::try_from(i).ok())
            .filter(|i| !self.responses.contains_key(i))
            .collect()
    }

    /// Marks the end of the response period.
    pub fn set_timeout(&mut self) {
        self.timeout = true;
    }

    /// Fixes the expected threshold before any deal is seen.
    pub fn set_threshold(&mut self, t: usize) {
        self.t = t;
    }

    pub fn threshold(&self) -> usize {
        self.t
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn deal(&self) -> Option<&Deal<S>> {
        self.deal.as_ref()
    }

    pub fn responses(&self) -> &BTreeMap<u32, Response> {
        &self.responses
    }
}

/// Creates the deals of a secret and answers complaints about them.
pub struct Dealer<S: Suite> {
    suite: S,
    long: S::Scalar,
    public: S::Element,
    secret: S::Scalar,
    verifiers: Vec<S::Element>,
    context: Vec<u8>,
    deals: Vec<Deal<S>>,
    aggregator: Aggregator<S>,
}

impl<S: Suite> core::fmt::Debug for Dealer<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dealer")
            .field("public", &self.public)
            .field("verifiers", &self.verifiers.len())
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl<S: Suite> Dealer<S> {
    /// Shares `secret` among `verifiers` with threshold `t`.
    pub fn new<R: RngCore + CryptoRng + ?Sized>(
        suite: S,
        long: S::Scalar,
        secret: S::Scalar,
        verifiers: Vec<S::Element>,
        t: usize,
        rng: &mut R,
    ) -> Result<Self, VssError> {
        if !valid_t(t, verifiers.len()) {
            return Err(VssError::InvalidThreshold { t, n: verifiers.len() });
        }
        let public = suite.base_mul(&long);
        let mut poly = PriPoly::new(suite.clone(), t, Some(secret.clone()), rng)?;
        let commits = poly.commit(None).into_commits();
        let sid = session_id(&suite, &public, &verifiers, &commits, t)?;
        let n = u32::try_from(verifiers.len()).map_err(|_| VssError::InvalidThreshold { t, n: verifiers.len() })?;
        let deals = poly
            .shares(n)
            .into_iter()
            .map(|share| Deal { session_id: sid.clone(), share, commitments: commits.clone(), t: t as u32 })
            .collect();
        poly.zeroize();

        let context = context(&suite, &public, &verifiers);
        let aggregator = Aggregator::new(suite.clone(), public.clone(), verifiers.clone(), commits, t, sid);
        Ok(Self { suite, long, public, secret, verifiers, context, deals, aggregator })
    }

    /// The plaintext deal for verifier `i`; for tests and justifications only.
    pub fn plaintext_deal(&self, i: usize) -> Option<&Deal<S>> {
        self.deals.get(i)
    }

    /// Encrypts the deal of verifier `i` to its public key.
    pub fn encrypted_deal<R: RngCore + CryptoRng + ?Sized>(
        &self,
        i: usize,
        rng: &mut R,
    ) -> Result<EncryptedShare<S>, VssError> {
        let index = u32::try_from(i).unwrap_or(u32::MAX);
        let (deal, recipient) =
            self.deals.get(i).zip(self.verifiers.get(i)).ok_or(VssError::IndexOutOfBounds(index))?;
        let mut plaintext = deal.to_wire()?;
        let auth = Schnorr::new(self.suite.clone());
        let encrypted = ecies::encrypt(&self.suite, &auth, &self.long, recipient, &self.context, &plaintext, rng);
        plaintext.zeroize();
        Ok(encrypted?)
    }

    /// One encrypted deal per verifier, in verifier order.
    pub fn encrypted_deals<R: RngCore + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<EncryptedShare<S>>, VssError> {
        (0..self.verifiers.len()).map(|i| self.encrypted_deal(i, rng)).collect()
    }

    /// Records `response`; a valid complaint is answered with a signed justification that must
    /// be broadcast to every verifier.
    pub fn process_response(&mut self, response: &Response) -> Result<Option<Justification<S>>, VssError> {
        self.aggregator.verify_response(response)?;
        if response.approved {
            return Ok(None);
        }
        let deal = usize::try_from(response.index)
            .ok()
            .and_then(|i| self.deals.get(i))
            .ok_or(VssError::IndexOutOfBounds(response.index))?;
        let mut justification = Justification {
            session_id: self.aggregator.session_id.clone(),
            index: response.index,
            deal: deal.clone(),
            signature: Vec::new(),
        };
        justification.signature = Schnorr::new(self.suite.clone()).sign(&self.long, &justification.transcript())?;
        log::debug!(target: "kyber::vss", "justifying the complaint of verifier {}", response.index);
        Ok(Some(justification))
    }

    /// Commitment to the secret, once the deal is certified.
    pub fn secret_commit(&self) -> Option<S::Element> {
        self.certified().then(|| self.suite.base_mul(&self.secret))
    }

    /// Coefficient commitments, once the deal is certified.
    pub fn commits(&self) -> Option<&[S::Element]> {
        self.certified().then_some(self.aggregator.commits.as_slice())
    }

    fn certified(&self) -> bool {
        self.aggregator.enough_approvals() && self.aggregator.deal_certified()
    }

    pub fn public(&self) -> &S::Element {
        &self.public
    }

    pub fn session_id(&self) -> &[u8] {
        &self.aggregator.session_id
    }

    pub fn aggregator(&self) -> &Aggregator<S> {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut Aggregator<S> {
        &mut self.aggregator
    }
}

impl<S: Suite> Drop for Dealer<S> {
    fn drop(&mut self) {
        self.long.zeroize();
        self.secret.zeroize();
    }
}

/// Receives one deal from a dealer and checks it together with the other verifiers.
pub struct Verifier<S: Suite> {
    suite: S,
    long: S::Scalar,
    public: S::Element,
    dealer: S::Element,
    index: u32,
    verifiers: Vec<S::Element>,
    context: Vec<u8>,
    aggregator: Aggregator<S>,
}

impl<S: Suite> core::fmt::Debug for Verifier<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Verifier")
            .field("index", &self.index)
            .field("public", &self.public)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl<S: Suite> Verifier<S> {
    /// A verifier whose public key must be one of `verifiers`.
    pub fn new(suite: S, long: S::Scalar, dealer: S::Element, verifiers: Vec<S::Element>) -> Result<Self, VssError> {
        let public = suite.base_mul(&long);
        let index = verifiers.iter().position(|v| *v == public).ok_or(VssError::NotAVerifier)?;
        let index = u32::try_from(index).map_err(|_| VssError::IndexOutOfBounds(u32::MAX))?;
        let context = context(&suite, &dealer, &verifiers);
        let aggregator = Aggregator::empty(suite.clone(), dealer.clone(), verifiers.clone());
        Ok(Self { suite, long, public, dealer, index, verifiers, context, aggregator })
    }

    /// Decrypts and checks the deal addressed to this verifier.
    ///
    /// Returns the signed response to broadcast: an approval for a valid deal, a complaint
    /// otherwise. Errors are reserved for deals that cannot be answered at all.
    pub fn process_encrypted_deal(&mut self, encrypted: &EncryptedShare<S>) -> Result<Response, VssError> {
        let auth = Schnorr::new(self.suite.clone());
        let plaintext = ecies::decrypt(&self.suite, &auth, &self.dealer, &self.long, &self.context, encrypted)?;
        let deal = Deal::<S>::from_wire(&self.suite, &plaintext)?;
        if deal.share.index != self.index {
            return Err(VssError::WrongIndex { expected: self.index, got: deal.share.index });
        }

        let sid = session_id(&self.suite, &self.dealer, &self.verifiers, &deal.commitments, deal.t as usize)?;
        let mut response = Response { session_id: sid, index: self.index, approved: true, signature: Vec::new() };
        match self.aggregator.verify_deal(&deal, true) {
            Ok(()) => {},
            Err(VssError::DealAlreadyProcessed) => return Err(VssError::DealAlreadyProcessed),
            Err(e) => {
                log::warn!(target: "kyber::vss", "verifier {} complains: {e}", self.index);
                response.approved = false;
            },
        }
        response.signature = auth.sign(&self.long, &response.transcript())?;
        self.aggregator.add_response(response.clone())?;
        Ok(response)
    }

    /// Records the response of another verifier.
    pub fn process_response(&mut self, response: &Response) -> Result<(), VssError> {
        self.aggregator.verify_response(response)
    }

    /// Checks the dealer's answer to a complaint.
    pub fn process_justification(&mut self, justification: &Justification<S>) -> Result<(), VssError> {
        self.aggregator.verify_justification(justification)
    }

    /// The received deal, once it is certified.
    pub fn deal(&self) -> Option<&Deal<S>> {
        if self.aggregator.enough_approvals() && self.aggregator.deal_certified() {
            self.aggregator.deal()
        } else {
            None
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn public(&self) -> &S::Element {
        &self.public
    }

    pub fn session_id(&self) -> &[u8] {
        &self.aggregator.session_id
    }

    pub fn aggregator(&self) -> &Aggregator<S> {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut Aggregator<S> {
        &mut self.aggregator
    }
}

impl<S: Suite> Drop for Verifier<S> {
    fn drop(&mut self) {
        self.long.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::testing::rng;
    use crate::group::{Ed25519, P256};
    use crate::poly::recover_secret;
    use crate::sign::KeyPair;

    struct Setup<S: Suite> {
        suite: S,
        dealer: KeyPair<S>,
        verifiers: Vec<KeyPair<S>>,
        secret: S::Scalar,
    }

    fn setup<S: Suite>(suite: S, n: usize, seed: u64) -> Setup<S> {
        let mut rng = rng(seed);
        let dealer = KeyPair::new(&suite, &mut rng);
        let verifiers = (0..n).map(|_| KeyPair::new(&suite, &mut rng)).collect();
        let secret = suite.pick_scalar(&mut rng);
        Setup { suite, dealer, verifiers, secret }
    }

    impl<S: Suite> Setup<S> {
        fn publics(&self) -> Vec<S::Element> {
            self.verifiers.iter().map(|k| k.public().clone()).collect()
        }

        fn dealer(&self, t: usize, seed: u64) -> Dealer<S> {
            Dealer::new(
                self.suite.clone(),
                self.dealer.expose_secret().clone(),
                self.secret.clone(),
                self.publics(),
                t,
                &mut rng(seed),
            )
            .unwrap()
        }

        fn verifier(&self, i: usize) -> Verifier<S> {
            Verifier::new(
                self.suite.clone(),
                self.verifiers[i].expose_secret().clone(),
                self.dealer.public().clone(),
                self.publics(),
            )
            .unwrap()
        }
    }

    #[test]
    fn thresholds() {
        assert_eq!(minimum_t(10), 5);
        assert_eq!(minimum_t(7), 4);
        assert!(valid_t(4, 7));
        assert!(!valid_t(3, 7));
        assert!(!valid_t(8, 7));
        assert!(!valid_t(1, 1));

        let s = setup(Ed25519, 5, 1);
        let err = Dealer::new(Ed25519, s.secret.clone(), s.secret.clone(), s.publics(), 6, &mut rng(2)).unwrap_err();
        assert_eq!(err, VssError::InvalidThreshold { t: 6, n: 5 });
    }

    #[test]
    fn whole_protocol() {
        let n = 7;
        let t = minimum_t(n);
        let s = setup(Ed25519, n, 3);
        let mut dealer = s.dealer(t, 4);
        let mut verifiers: Vec<_> = (0..n).map(|i| s.verifier(i)).collect();
        let mut rng = rng(5);

        let deals = dealer.encrypted_deals(&mut rng).unwrap();
        let responses: Vec<_> = verifiers
            .iter_mut()
            .zip(&deals)
            .map(|(v, d)| v.process_encrypted_deal(d).unwrap())
            .collect();
        assert!(responses.iter().all(|r| r.approved));

        for r in &responses {
            assert!(dealer.process_response(r).unwrap().is_none());
            for v in verifiers.iter_mut().filter(|v| v.index() != r.index) {
                v.process_response(r).unwrap();
            }
        }

        assert_eq!(dealer.secret_commit().unwrap(), Ed25519.base_mul(&s.secret));
        assert_eq!(dealer.commits().unwrap().len(), t);
        let shares: Vec<_> = verifiers.iter().map(|v| v.deal().unwrap().share.clone()).collect();
        assert_eq!(recover_secret(&Ed25519, &shares, t).unwrap(), s.secret);
        assert!(verifiers.iter().all(|v| v.session_id() == dealer.session_id()));
    }

    #[test]
    fn verifier_rejects_foreign_and_repeated_deals() {
        let s = setup(P256, 4, 6);
        let dealer = s.dealer(3, 7);
        let mut v0 = s.verifier(0);
        let mut rng = rng(8);

        let other = dealer.encrypted_deal(1, &mut rng).unwrap();
        assert!(matches!(v0.process_encrypted_deal(&other), Err(VssError::Ecies(EciesError::Decryption))));

        let mine = dealer.encrypted_deal(0, &mut rng).unwrap();
        assert!(v0.process_encrypted_deal(&mine).unwrap().approved);
        assert_eq!(v0.process_encrypted_deal(&mine), Err(VssError::DealAlreadyProcessed));
        assert!(dealer.encrypted_deal(4, &mut rng).is_err());
        assert!(Verifier::new(P256, P256.scalar_one(), s.dealer.public().clone(), s.publics()).is_err());
    }

    #[test]
    fn complaint_and_justification() {
        let n = 5;
        let t = 3;
        let s = setup(Ed25519, n, 9);
        let mut dealer = s.dealer(t, 10);
        let mut v0 = s.verifier(0);
        let mut v1 = s.verifier(1);

        // deal with a share that does not match the commitments
        let mut deal = dealer.plaintext_deal(0).unwrap().clone();
        deal.share.value = deal.share.value.add(&Ed25519.scalar_one());
        let auth = Schnorr::new(Ed25519);
        let bad = ecies::encrypt(
            &Ed25519,
            &auth,
            s.dealer.expose_secret(),
            s.verifiers[0].public(),
            &context(&Ed25519, s.dealer.public(), &s.publics()),
            &deal.to_wire().unwrap(),
            &mut rng(11),
        )
        .unwrap();
        let complaint = v0.process_encrypted_deal(&bad).unwrap();
        assert!(!complaint.approved);

        let justification = dealer.process_response(&complaint).unwrap().unwrap();
        assert_eq!(justification.index, 0);

        let good = dealer.encrypted_deal(1, &mut rng(12)).unwrap();
        assert!(v1.process_encrypted_deal(&good).unwrap().approved);
        v1.process_response(&complaint).unwrap();
        v1.process_justification(&justification).unwrap();
        assert!(v1.aggregator().responses()[&0].approved);

        let mut forged = justification.clone();
        forged.deal.share.value = forged.deal.share.value.add(&Ed25519.scalar_one());
        let mut v2 = s.verifier(2);
        let deal2 = dealer.encrypted_deal(2, &mut rng(13)).unwrap();
        v2.process_encrypted_deal(&deal2).unwrap();
        v2.process_response(&complaint).unwrap();
        assert!(matches!(v2.process_justification(&forged), Err(VssError::Signature(_))));
    }

    #[test]
    fn bad_justification_flags_the_dealer() {
        let s = setup(Ed25519, 4, 14);
        let dealer = s.dealer(3, 15);
        let mut agg = Aggregator::empty(Ed25519, s.dealer.public().clone(), s.publics());
        agg.verify_deal(dealer.plaintext_deal(1).unwrap(), true).unwrap();

        let auth = Schnorr::new(Ed25519);
        let mut complaint = Response {
            session_id: dealer.session_id().to_vec(),
            index: 0,
            approved: false,
            signature: Vec::new(),
        };
        complaint.signature = s.verifiers[0].sign(&auth, &complaint.transcript()).unwrap();
        agg.verify_response(&complaint).unwrap();
        assert_eq!(agg.verify_response(&complaint), Err(VssError::DuplicateResponse(0)));

        let mut deal = dealer.plaintext_deal(0).unwrap().clone();
        deal.share.value = Ed25519.scalar_zero();
        let mut justification =
            Justification { session_id: dealer.session_id().to_vec(), index: 0, deal, signature: Vec::new() };
        justification.signature = s.dealer.sign(&auth, &justification.transcript()).unwrap();
        assert_eq!(agg.verify_justification(&justification), Err(VssError::InvalidShare));
        assert!(!agg.deal_certified());
    }

    #[test]
    fn certification_with_timeout() {
        let n = 5;
        let t = 3;
        let s = setup(Ed25519, n, 16);
        let mut dealer = s.dealer(t, 17);
        let mut rng = rng(18);
        for i in 0..t {
            let mut v = s.verifier(i);
            let r = v.process_encrypted_deal(&dealer.encrypted_deal(i, &mut rng).unwrap()).unwrap();
            dealer.process_response(&r).unwrap();
        }
        assert!(dealer.aggregator().enough_approvals());
        assert!(!dealer.aggregator().deal_certified());
        assert_eq!(dealer.aggregator().missing_responses(), vec![3, 4]);
        assert!(dealer.secret_commit().is_none());

        dealer.aggregator_mut().set_timeout();
        assert!(dealer.aggregator().deal_certified());
        assert!(dealer.secret_commit().is_some());
    }

    #[test]
    fn responses_are_authenticated() {
        let s = setup(Ed25519, 4, 19);
        let mut dealer = s.dealer(3, 20);
        let mut v0 = s.verifier(0);
        let mut r = v0.process_encrypted_deal(&dealer.encrypted_deal(0, &mut rng(21)).unwrap()).unwrap();
        r.index = 1;
        assert!(matches!(dealer.process_response(&r), Err(VssError::Signature(_))));
        r.index = 9;
        assert_eq!(dealer.process_response(&r), Err(VssError::IndexOutOfBounds(9)));
        r.index = 0;
        r.session_id = vec![0; 32];
        assert_eq!(dealer.process_response(&r), Err(VssError::SessionIdMismatch));
    }

    #[test]
    fn deals_survive_the_wire() {
        let s = setup(Ed25519, 4, 22);
        let dealer = s.dealer(3, 23);
        let deal = dealer.plaintext_deal(2).unwrap();
        let bytes = deal.to_wire().unwrap();
        assert_eq!(&Deal::from_wire(&Ed25519, &bytes).unwrap(), deal);
        assert!(Deal::<Ed25519>::from_wire(&Ed25519, &bytes[..bytes.len() - 1]).is_err());
    }
}
