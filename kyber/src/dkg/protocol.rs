//! Drives a [`DistKeyGenerator`] over a broadcast board.
//!
//! Phases are advanced by a [`Phaser`], usually on a timer. In fast sync mode a phase also ends as
//! soon as every expected bundle has arrived.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::mpsc;

use super::config::Config;
use super::generator::{DistKeyGenerator, DkgError, Progress};
use super::store::BundleSet;
use super::structs::{DealBundle, DkgResult, JustificationBundle, Packet, Phase, ResponseBundle};
use crate::group::Group;
use crate::suite::Suite;

/// Receiving ends of a [`Board`].
pub struct Incoming<S: Suite> {
    pub deals: mpsc::UnboundedReceiver<DealBundle<S>>,
    pub responses: mpsc::UnboundedReceiver<ResponseBundle>,
    pub justifications: mpsc::UnboundedReceiver<JustificationBundle<S>>,
}

/// Authenticated broadcast channel between the participants.
///
/// Whatever a node pushes must eventually reach every participant, the pushing node included or
/// not.
pub trait Board<S: Suite>: Send {
    fn push_deals(&mut self, bundle: &DealBundle<S>);
    fn push_responses(&mut self, bundle: &ResponseBundle);
    fn push_justifications(&mut self, bundle: &JustificationBundle<S>);
    /// Hands out the incoming bundles; `None` once they were taken.
    fn incoming(&mut self) -> Option<Incoming<S>>;
}

struct Outgoing<S: Suite> {
    deals: mpsc::UnboundedSender<DealBundle<S>>,
    responses: mpsc::UnboundedSender<ResponseBundle>,
    justifications: mpsc::UnboundedSender<JustificationBundle<S>>,
}

/// An in-memory [`Board`] that delivers every bundle to every participant.
pub struct ChannelBoard<S: Suite> {
    peers: Arc<Vec<Outgoing<S>>>,
    incoming: Option<Incoming<S>>,
}

impl<S: Suite> ChannelBoard<S> {
    /// One connected board per participant.
    pub fn network(n: usize) -> Vec<Self> {
        let (outgoing, incoming): (Vec<_>, Vec<_>) = (0..n)
            .map(|_| {
                let (deals, deals_rx) = mpsc::unbounded_channel();
                let (responses, responses_rx) = mpsc::unbounded_channel();
                let (justifications, justifications_rx) = mpsc::unbounded_channel();
                (
                    Outgoing { deals, responses, justifications },
                    Incoming { deals: deals_rx, responses: responses_rx, justifications: justifications_rx },
                )
            })
            .unzip();
        let peers = Arc::new(outgoing);
        incoming.into_iter().map(|i| Self { peers: peers.clone(), incoming: Some(i) }).collect()
    }
}

impl<S: Suite> Board<S> for ChannelBoard<S> {
    fn push_deals(&mut self, bundle: &DealBundle<S>) {
        for peer in self.peers.iter() {
            // a peer that is gone does not need the bundle anymore
            let _ = peer.deals.send(bundle.clone());
        }
    }

    fn push_responses(&mut self, bundle: &ResponseBundle) {
        for peer in self.peers.iter() {
            let _ = peer.responses.send(bundle.clone());
        }
    }

    fn push_justifications(&mut self, bundle: &JustificationBundle<S>) {
        for peer in self.peers.iter() {
            let _ = peer.justifications.send(bundle.clone());
        }
    }

    fn incoming(&mut self) -> Option<Incoming<S>> {
        self.incoming.take()
    }
}

/// Source of phase transitions.
pub trait Phaser: Send {
    /// Starts emitting phases, ending with [`Phase::Finish`].
    fn start(self) -> mpsc::Receiver<Phase>;
}

/// A [`Phaser`] that moves to the next phase every `period`.
#[derive(Debug, Clone, Copy)]
pub struct TimePhaser {
    period: Duration,
}

impl TimePhaser {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Phaser for TimePhaser {
    /// Must be called within a Tokio runtime.
    fn start(self) -> mpsc::Receiver<Phase> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for phase in [Phase::Deal, Phase::Response, Phase::Justif] {
                if tx.send(phase).await.is_err() {
                    return;
                }
                tokio::time::sleep(self.period).await;
            }
            let _ = tx.send(Phase::Finish).await;
        });
        rx
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolOptions {
    /// Accept bundles without checking their signature, for boards that already authenticate
    /// their senders.
    pub skip_verification: bool,
}

enum Flow<G: Group> {
    Continue,
    Done(Option<DkgResult<G>>),
}

/// A full run of the protocol for one node.
pub struct Protocol<S: Suite, B: Board<S>> {
    dkg: DistKeyGenerator<S>,
    board: B,
    incoming: Incoming<S>,
    phases: mpsc::Receiver<Phase>,
    options: ProtocolOptions,
    phase: Phase,
    deals: BundleSet<DealBundle<S>>,
    responses: BundleSet<ResponseBundle>,
    justifications: BundleSet<JustificationBundle<S>>,
}

impl<S: Suite, B: Board<S>> Protocol<S, B> {
    /// Sets up the node and starts the phaser. Must be called within a Tokio runtime.
    pub fn new(
        config: Config<S>,
        mut board: B,
        phaser: impl Phaser,
        options: ProtocolOptions,
    ) -> Result<Self, DkgError> {
        let dkg = DistKeyGenerator::new(config)?;
        let incoming = board.incoming().ok_or(DkgError::Interrupted)?;
        Ok(Self {
            dkg,
            board,
            incoming,
            phases: phaser.start(),
            options,
            phase: Phase::Init,
            deals: BundleSet::new(),
            responses: BundleSet::new(),
            justifications: BundleSet::new(),
        })
    }

    pub fn generator(&self) -> &DistKeyGenerator<S> {
        &self.dkg
    }

    /// Runs until the end of the protocol. Nodes that only leave the group get no result.
    pub async fn run(mut self) -> Result<Option<DkgResult<S>>, DkgError> {
        loop {
            tokio::select! {
                phase = self.phases.recv() => match phase {
                    Some(phase) => {
                        if let Flow::Done(result) = self.move_to(phase)? {
                            return Ok(result);
                        }
                    },
                    None => return Err(DkgError::Interrupted),
                },
                Some(bundle) = self.incoming.deals.recv() => {
                    if self.phase <= Phase::Deal {
                        accept(&self.dkg, &self.options, &mut self.deals, bundle);
                    }
                },
                Some(bundle) = self.incoming.responses.recv() => {
                    if self.phase <= Phase::Response {
                        accept(&self.dkg, &self.options, &mut self.responses, bundle);
                    }
                },
                Some(bundle) = self.incoming.justifications.recv() => {
                    if self.phase <= Phase::Justif {
                        accept(&self.dkg, &self.options, &mut self.justifications, bundle);
                    }
                },
                else => return Err(DkgError::Interrupted),
            }
            if let Flow::Done(result) = self.fast_forward()? {
                return Ok(result);
            }
        }
    }

    /// In fast sync mode, ends every phase whose bundles are all in.
    fn fast_forward(&mut self) -> Result<Flow<S>, DkgError> {
        if !self.dkg.config().fast_sync {
            return Ok(Flow::Continue);
        }
        let dealers = self.dkg.config().old_nodes.len();
        let holders = self.dkg.expected_responses_fast_sync();
        loop {
            let next = match self.phase {
                Phase::Init | Phase::Deal if self.deals.len() == dealers => Phase::Response,
                Phase::Response if self.responses.len() == holders => Phase::Justif,
                Phase::Justif if self.justifications.len() == dealers => Phase::Finish,
                _ => return Ok(Flow::Continue),
            };
            debug!("every bundle is in, moving to the {next} phase");
            if let Flow::Done(result) = self.move_to(next)? {
                return Ok(Flow::Done(result));
            }
        }
    }

    /// Moves forward to `phase`, running every phase skipped on the way.
    fn move_to(&mut self, phase: Phase) -> Result<Flow<S>, DkgError> {
        while self.phase < phase {
            let flow = match self.phase {
                Phase::Init => self.deal()?,
                Phase::Deal => self.respond()?,
                Phase::Response => self.justify()?,
                Phase::Justif | Phase::Finish => self.finish()?,
            };
            if let Flow::Done(result) = flow {
                self.phase = Phase::Finish;
                return Ok(Flow::Done(result));
            }
        }
        Ok(Flow::Continue)
    }

    fn deal(&mut self) -> Result<Flow<S>, DkgError> {
        self.phase = Phase::Deal;
        if self.dkg.can_issue() {
            let bundle = self.dkg.deals()?;
            if let Err(err) = self.deals.push(bundle.clone()) {
                error!("own bundle rejected: {err}");
            }
            self.board.push_deals(&bundle);
        }
        Ok(Flow::Continue)
    }

    fn respond(&mut self) -> Result<Flow<S>, DkgError> {
        self.phase = Phase::Response;
        let bundles = self.deals.take();
        debug!("processing {} deal bundles", bundles.len());
        if let Some(bundle) = self.dkg.process_deals(&bundles)? {
            if let Err(err) = self.responses.push(bundle.clone()) {
                error!("own bundle rejected: {err}");
            }
            self.board.push_responses(&bundle);
        }
        Ok(Flow::Continue)
    }

    fn justify(&mut self) -> Result<Flow<S>, DkgError> {
        self.phase = Phase::Justif;
        let bundles = self.responses.take();
        debug!("processing {} response bundles", bundles.len());
        match self.dkg.process_responses(&bundles)? {
            Progress::Finished(result) => Ok(Flow::Done(result)),
            Progress::Justify(bundle) => {
                if let Some(bundle) = bundle {
                    if let Err(err) = self.justifications.push(bundle.clone()) {
                        error!("own bundle rejected: {err}");
                    }
                    self.board.push_justifications(&bundle);
                }
                Ok(Flow::Continue)
            },
        }
    }

    fn finish(&mut self) -> Result<Flow<S>, DkgError> {
        self.phase = Phase::Finish;
        let bundles = self.justifications.take();
        debug!("processing {} justification bundles", bundles.len());
        Ok(Flow::Done(self.dkg.process_justifications(&bundles)?))
    }
}

/// Stores a verified bundle; returns whether it is new.
fn accept<S: Suite, P: Packet>(
    dkg: &DistKeyGenerator<S>,
    options: &ProtocolOptions,
    set: &mut BundleSet<P>,
    bundle: P,
) -> bool {
    if !options.skip_verification {
        if let Err(err) = dkg.verify_packet_signature(&bundle) {
            error!("dropping bundle from {}: {err}", bundle.index());
            return false;
        }
    }
    match set.push(bundle) {
        Ok(fresh) => fresh,
        Err(err) => {
            warn!("dropping bundle: {err}");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::dkg::config::get_nonce;
    use crate::dkg::structs::{Index, Node};
    use crate::group::testing::rng;
    use crate::group::{Ed25519, Group};
    use crate::poly::recover_secret;
    use crate::sign::KeyPair;

    fn keys(n: usize, seed: u64) -> Vec<KeyPair<Ed25519>> {
        let mut rng = rng(seed);
        (0..n).map(|_| KeyPair::new(&Ed25519, &mut rng)).collect()
    }

    fn configs(keys: &[KeyPair<Ed25519>], t: usize, fast_sync: bool) -> Vec<Config<Ed25519>> {
        let nonce = get_nonce();
        let nodes: Vec<_> = keys.iter().enumerate().map(|(i, k)| Node::new(i as Index, k.public().clone())).collect();
        keys.iter()
            .map(|k| {
                Config::new_dkg(Ed25519, k.expose_secret().clone(), nodes.clone(), t, nonce.clone())
                    .with_fast_sync(fast_sync)
            })
            .collect()
    }

    async fn run_all<B: Board<Ed25519> + 'static>(
        configs: Vec<Config<Ed25519>>,
        boards: Vec<B>,
        period: Duration,
        options: ProtocolOptions,
    ) -> Vec<Result<Option<DkgResult<Ed25519>>, DkgError>> {
        let tasks = configs.into_iter().zip(boards).map(|(config, board)| {
            let protocol = Protocol::new(config, board, TimePhaser::new(period), options).unwrap();
            tokio::spawn(protocol.run())
        });
        join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect()
    }

    fn check_secret(results: &[DkgResult<Ed25519>], t: usize) {
        let shares: Vec<_> = results.iter().take(t).map(|r| r.key.pri_share().clone()).collect();
        let secret = recover_secret(&Ed25519, &shares, t).unwrap();
        assert_eq!(Some(&Ed25519.base_mul(&secret)), results[0].key.public());
        assert!(results.iter().all(|r| r.public_equal(&results[0])));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timed_run_over_a_channel_board() {
        let keys = keys(5, 1);
        let results = run_all(
            configs(&keys, 3, false),
            ChannelBoard::network(5),
            Duration::from_millis(200),
            ProtocolOptions::default(),
        )
        .await;
        let results: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        for r in &results {
            assert_eq!(r.qual.len(), 5);
        }
        check_secret(&results, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fast_sync_does_not_wait_for_the_phaser() {
        let keys = keys(4, 2);
        let run = run_all(
            configs(&keys, 3, true),
            ChannelBoard::network(4),
            Duration::from_secs(3600),
            ProtocolOptions::default(),
        );
        let results = tokio::time::timeout(Duration::from_secs(30), run).await.unwrap();
        let results: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        check_secret(&results, 3);
    }

    /// Corrupts the signature of every deal bundle issued by dealer 0.
    struct ForgingBoard(ChannelBoard<Ed25519>);

    impl Board<Ed25519> for ForgingBoard {
        fn push_deals(&mut self, bundle: &DealBundle<Ed25519>) {
            let mut bundle = bundle.clone();
            if bundle.dealer_index == 0 {
                bundle.signature[0] ^= 1;
            }
            self.0.push_deals(&bundle)
        }

        fn push_responses(&mut self, bundle: &ResponseBundle) {
            self.0.push_responses(bundle)
        }

        fn push_justifications(&mut self, bundle: &JustificationBundle<Ed25519>) {
            self.0.push_justifications(bundle)
        }

        fn incoming(&mut self) -> Option<Incoming<Ed25519>> {
            self.0.incoming()
        }
    }

    fn forging_network(n: usize) -> Vec<ForgingBoard> {
        ChannelBoard::network(n).into_iter().map(ForgingBoard).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn badly_signed_deals_are_dropped() {
        let keys = keys(5, 3);
        let mut results = run_all(
            configs(&keys, 3, false),
            forging_network(5),
            Duration::from_millis(200),
            ProtocolOptions::default(),
        )
        .await;
        assert_eq!(results.remove(0).unwrap_err(), DkgError::Evicted);
        let results: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        for r in &results {
            assert_eq!(r.qual.iter().map(|n| n.index).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        }
        check_secret(&results, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn skipping_verification_accepts_any_signature() {
        let keys = keys(5, 4);
        let results = run_all(
            configs(&keys, 3, false),
            forging_network(5),
            Duration::from_millis(200),
            ProtocolOptions { skip_verification: true },
        )
        .await;
        let results: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        for r in &results {
            assert_eq!(r.qual.len(), 5);
        }
        check_secret(&results, 3);
    }

    #[tokio::test]
    async fn own_bundle_is_stored_once() {
        let keys = keys(3, 6);
        let mut boards = ChannelBoard::network(3);
        let config = configs(&keys, 2, false).remove(0);
        let mut protocol = Protocol::new(
            config,
            boards.remove(0),
            TimePhaser::new(Duration::from_secs(3600)),
            ProtocolOptions::default(),
        )
        .unwrap();
        assert!(matches!(protocol.move_to(Phase::Deal), Ok(Flow::Continue)));
        assert_eq!(protocol.deals.len(), 1);

        // the board hands the bundle back to its issuer as well
        let echoed = protocol.incoming.deals.try_recv().unwrap();
        assert!(!accept(&protocol.dkg, &protocol.options, &mut protocol.deals, echoed));
        assert_eq!(protocol.deals.len(), 1);
        assert!(protocol.deals.bad().is_empty());
    }

    #[tokio::test]
    async fn board_can_only_be_used_once() {
        let keys = keys(3, 5);
        let mut boards = ChannelBoard::network(3);
        let _incoming = boards[0].incoming().unwrap();
        let config = configs(&keys, 2, false).remove(0);
        let err = Protocol::new(config, boards.remove(0), TimePhaser::new(Duration::from_secs(1)), ProtocolOptions::default())
            .err()
            .unwrap();
        assert_eq!(err, DkgError::Interrupted);
    }
}
