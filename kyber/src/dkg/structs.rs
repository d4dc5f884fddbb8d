//! Participants, bundles and results of the key generation protocol.
//!
//! Every bundle is signed over [`Packet::hash`], a SHA-256 digest of its fields in a canonical
//! order: entries are sorted by index, indices are big-endian `u32`s and group values use their
//! fixed-width encoding.

use core::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ecies::EncryptedShare;
use crate::group::{Element, Group, Scalar};
use crate::marshal::{Decoder, Encoder, Marshal, MarshalError};
use crate::poly::{PriShare, PubPoly};

/// Position of a participant in the old or the new node list.
pub type Index = u32;

/// A participant: its index in one of the node lists and its long-term public key.
#[derive(Clone, Debug)]
pub struct Node<G: Group> {
    pub index: Index,
    pub public: G::Element,
}

impl<G: Group> Node<G> {
    pub fn new(index: Index, public: G::Element) -> Self {
        Self { index, public }
    }
}

impl<G: Group> Marshal<G> for Node<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.index).element(&self.public);
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        Ok(Self { index: dec.u32()?, public: dec.element()? })
    }
}

// Equality only needs the fields to compare, whatever the group type itself implements.
macro_rules! field_eq {
    ($($ty:ident { $($field:ident),* })*) => {$(
        impl<G: Group> PartialEq for $ty<G> {
            fn eq(&self, other: &Self) -> bool {
                true $(&& self.$field == other.$field)*
            }
        }

        impl<G: Group> Eq for $ty<G> {}
    )*};
}

field_eq! {
    Node { index, public }
    Deal { share_index, encrypted_share }
    DealBundle { dealer_index, deals, public, session_id, signature }
    Justification { share_index, share }
    JustificationBundle { dealer_index, justifications, session_id, signature }
    DistKeyShare { commits, share }
    DkgResult { qual, key }
}

/// Index of the node holding `public`.
pub(crate) fn find_pub<G: Group>(nodes: &[Node<G>], public: &G::Element) -> Option<Index> {
    nodes.iter().find(|n| &n.public == public).map(|n| n.index)
}

/// Public key of the node at `index`.
pub(crate) fn find_index<G: Group>(nodes: &[Node<G>], index: Index) -> Option<&G::Element> {
    nodes.iter().find(|n| n.index == index).map(|n| &n.public)
}

pub(crate) fn is_included<G: Group>(nodes: &[Node<G>], index: Index) -> bool {
    nodes.iter().any(|n| n.index == index)
}

/// Protocol phases, in the order they are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Deal,
    Response,
    Justif,
    Finish,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Deal => "deal",
            Phase::Response => "response",
            Phase::Justif => "justification",
            Phase::Finish => "finished",
        };
        f.write_str(name)
    }
}

/// Verdict of a share holder on the share it got from a dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    Success = 0,
    Complaint = 1,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<bool> for Status {
    fn from(ok: bool) -> Self {
        if ok {
            Status::Success
        } else {
            Status::Complaint
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = MarshalError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(Status::Success),
            1 => Ok(Status::Complaint),
            other => Err(MarshalError::InvalidBool(other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::Complaint => f.write_str("complaint"),
        }
    }
}

/// A signed message of the protocol.
pub trait Packet {
    /// Whether the issuer is a dealer (an old node) rather than a share holder.
    const FROM_DEALER: bool;

    /// Digest the signature is computed over.
    fn hash(&self) -> [u8; 32];
    /// Index of the issuer.
    fn index(&self) -> Index;
    fn signature(&self) -> &[u8];
    fn session_id(&self) -> &[u8];
}

/// The encrypted share of one holder.
#[derive(Clone, Debug)]
pub struct Deal<G: Group> {
    pub share_index: Index,
    pub encrypted_share: EncryptedShare<G>,
}

impl<G: Group> Marshal<G> for Deal<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.share_index).marshal(&self.encrypted_share)?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        Ok(Self { share_index: dec.u32()?, encrypted_share: dec.unmarshal()? })
    }
}

/// Everything a dealer sends in the deal phase.
#[derive(Clone, Debug)]
pub struct DealBundle<G: Group> {
    pub dealer_index: Index,
    pub deals: Vec<Deal<G>>,
    /// Commitments to the coefficients of the dealer's polynomial.
    pub public: Vec<G::Element>,
    pub session_id: Vec<u8>,
    pub signature: Vec<u8>,
}

impl<G: Group> Packet for DealBundle<G> {
    const FROM_DEALER: bool = true;

    fn hash(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(self.dealer_index.to_be_bytes());
        for c in &self.public {
            h.update(c.to_bytes());
        }
        let mut deals: Vec<_> = self.deals.iter().collect();
        deals.sort_by_key(|d| d.share_index);
        for deal in deals {
            h.update(deal.share_index.to_be_bytes());
            // an encrypted share that does not encode cannot be sent either
            if let Ok(bytes) = deal.encrypted_share.to_wire() {
                h.update(bytes);
            }
        }
        h.update(&self.session_id);
        h.finalize().into()
    }

    fn index(&self) -> Index {
        self.dealer_index
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn session_id(&self) -> &[u8] {
        &self.session_id
    }
}

impl<G: Group> Marshal<G> for DealBundle<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.dealer_index).len_u32(self.deals.len())?;
        for deal in &self.deals {
            enc.marshal(deal)?;
        }
        enc.len_u32(self.public.len())?;
        for c in &self.public {
            enc.element(c);
        }
        enc.var_bytes(&self.session_id)?.var_bytes(&self.signature)?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        let dealer_index = dec.u32()?;
        let n = dec.len_u32()?;
        let deals = dec.many(n)?;
        let n = dec.len_u32()?;
        let public = (0..n).map(|_| dec.element()).collect::<Result<_, _>>()?;
        Ok(Self { dealer_index, deals, public, session_id: dec.var_bytes()?, signature: dec.var_bytes()? })
    }
}

/// Verdict of a holder on one dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub dealer_index: Index,
    pub status: Status,
}

impl<G: Group> Marshal<G> for Response {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.dealer_index).u8(self.status as u8);
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        Ok(Self { dealer_index: dec.u32()?, status: Status::try_from(dec.u8()?)? })
    }
}

/// Everything a share holder sends in the response phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBundle {
    pub share_index: Index,
    pub responses: Vec<Response>,
    pub session_id: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Packet for ResponseBundle {
    const FROM_DEALER: bool = false;

    fn hash(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(self.share_index.to_be_bytes());
        let mut responses = self.responses.clone();
        responses.sort_by_key(|r| r.dealer_index);
        for r in responses {
            h.update(r.dealer_index.to_be_bytes());
            h.update([r.status as u8]);
        }
        h.update(&self.session_id);
        h.finalize().into()
    }

    fn index(&self) -> Index {
        self.share_index
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn session_id(&self) -> &[u8] {
        &self.session_id
    }
}

impl fmt::Display for ResponseBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "holder {}:", self.share_index)?;
        for r in &self.responses {
            write!(f, " {{dealer {}: {}}}", r.dealer_index, r.status)?;
        }
        Ok(())
    }
}

impl<G: Group> Marshal<G> for ResponseBundle {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.share_index).len_u32(self.responses.len())?;
        for r in &self.responses {
            enc.marshal::<G, _>(r)?;
        }
        enc.var_bytes(&self.session_id)?.var_bytes(&self.signature)?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        let share_index = dec.u32()?;
        let n = dec.len_u32()?;
        let responses = dec.many(n)?;
        Ok(Self { share_index, responses, session_id: dec.var_bytes()?, signature: dec.var_bytes()? })
    }
}

/// A share revealed by its dealer after a complaint.
#[derive(Clone, Debug)]
pub struct Justification<G: Group> {
    pub share_index: Index,
    pub share: G::Scalar,
}

impl<G: Group> Marshal<G> for Justification<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.share_index).scalar(&self.share);
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        Ok(Self { share_index: dec.u32()?, share: dec.scalar()? })
    }
}

/// Everything a dealer sends in the justification phase.
#[derive(Clone, Debug)]
pub struct JustificationBundle<G: Group> {
    pub dealer_index: Index,
    pub justifications: Vec<Justification<G>>,
    pub session_id: Vec<u8>,
    pub signature: Vec<u8>,
}

impl<G: Group> Packet for JustificationBundle<G> {
    const FROM_DEALER: bool = true;

    fn hash(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(self.dealer_index.to_be_bytes());
        let mut justifs: Vec<_> = self.justifications.iter().collect();
        justifs.sort_by_key(|j| j.share_index);
        for j in justifs {
            h.update(j.share_index.to_be_bytes());
            h.update(j.share.to_bytes());
        }
        h.update(&self.session_id);
        h.finalize().into()
    }

    fn index(&self) -> Index {
        self.dealer_index
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn session_id(&self) -> &[u8] {
        &self.session_id
    }
}

impl<G: Group> Marshal<G> for JustificationBundle<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.u32(self.dealer_index).len_u32(self.justifications.len())?;
        for j in &self.justifications {
            enc.marshal(j)?;
        }
        enc.var_bytes(&self.session_id)?.var_bytes(&self.signature)?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        let dealer_index = dec.u32()?;
        let n = dec.len_u32()?;
        let justifications = dec.many(n)?;
        Ok(Self { dealer_index, justifications, session_id: dec.var_bytes()?, signature: dec.var_bytes()? })
    }
}

/// The share of the distributed key a node ends up with.
#[derive(Clone)]
pub struct DistKeyShare<G: Group> {
    /// Commitments to the coefficients of the distributed polynomial.
    pub commits: Vec<G::Element>,
    pub share: PriShare<G::Scalar>,
}

impl<G: Group> fmt::Debug for DistKeyShare<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistKeyShare")
            .field("commits", &self.commits)
            .field("index", &self.share.index)
            .field("share", &"<redacted>")
            .finish()
    }
}

impl<G: Group> DistKeyShare<G> {
    /// The distributed public key.
    pub fn public(&self) -> Option<&G::Element> {
        self.commits.first()
    }

    pub fn pri_share(&self) -> &PriShare<G::Scalar> {
        &self.share
    }

    pub fn commitments(&self) -> &[G::Element] {
        &self.commits
    }

    /// The public polynomial committed to by [`DistKeyShare::commits`].
    pub fn pub_poly(&self, group: G) -> Result<PubPoly<G>, crate::poly::PolyError> {
        PubPoly::new(group, None, self.commits.clone())
    }
}

impl<G: Group> Drop for DistKeyShare<G> {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.share.value);
    }
}

impl<G: Group> Marshal<G> for DistKeyShare<G> {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.len_u32(self.commits.len())?;
        for c in &self.commits {
            enc.element(c);
        }
        enc.u32(self.share.index).scalar(&self.share.value);
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        let n = dec.len_u32()?;
        let commits = (0..n).map(|_| dec.element()).collect::<Result<_, _>>()?;
        Ok(Self { commits, share: PriShare { index: dec.u32()?, value: dec.scalar()? } })
    }
}

/// Output of a successful run: the qualified nodes and the local key share.
#[derive(Clone, Debug)]
pub struct DkgResult<G: Group> {
    pub qual: Vec<Node<G>>,
    pub key: DistKeyShare<G>,
}

impl<G: Group> DkgResult<G> {
    /// Whether both results agree on the qualified set and the public polynomial.
    pub fn public_equal(&self, other: &Self) -> bool {
        self.key.commits == other.key.commits && self.qual == other.qual
    }
}
