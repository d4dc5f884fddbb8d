//! Collects the bundles of one phase, at most one per issuer.

use std::collections::{BTreeMap, BTreeSet};

use super::structs::{Index, Packet};

/// Bundles received during one phase, keyed by issuer.
///
/// An issuer that sends the same bundle twice is harmless and the copy is dropped. An issuer that
/// sends two different bundles is equivocating: both are discarded and the issuer is marked as bad
/// for the rest of the phase.
#[derive(Debug, Clone)]
pub struct BundleSet<B> {
    bundles: BTreeMap<Index, (B, [u8; 32])>,
    bad: BTreeSet<Index>,
}

/// Error explaining why a bundle was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum StoreError {
    /// issuer {0} sent two different bundles
    Equivocation(Index),
    /// issuer {0} already equivocated in this phase
    BadIssuer(Index),
}

impl<B> Default for BundleSet<B> {
    fn default() -> Self {
        Self { bundles: BTreeMap::new(), bad: BTreeSet::new() }
    }
}

impl<B: Packet> BundleSet<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bundle`; returns `false` for an exact copy of a stored one.
    pub fn push(&mut self, bundle: B) -> Result<bool, StoreError> {
        let issuer = bundle.index();
        if self.bad.contains(&issuer) {
            return Err(StoreError::BadIssuer(issuer));
        }
        let hash = bundle.hash();
        match self.bundles.get(&issuer) {
            Some((_, stored)) if *stored == hash => Ok(false),
            Some(_) => {
                self.bundles.remove(&issuer);
                self.bad.insert(issuer);
                Err(StoreError::Equivocation(issuer))
            },
            None => {
                self.bundles.insert(issuer, (bundle, hash));
                Ok(true)
            },
        }
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Issuers caught equivocating.
    pub fn bad(&self) -> &BTreeSet<Index> {
        &self.bad
    }

    /// Removes every stored bundle, in ascending issuer order.
    pub fn take(&mut self) -> Vec<B> {
        core::mem::take(&mut self.bundles).into_values().map(|(b, _)| b).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Msg(Index, u8);

    impl Packet for Msg {
        const FROM_DEALER: bool = true;

        fn hash(&self) -> [u8; 32] {
            [self.1; 32]
        }

        fn index(&self) -> Index {
            self.0
        }

        fn signature(&self) -> &[u8] {
            &[]
        }

        fn session_id(&self) -> &[u8] {
            &[]
        }
    }

    macro_rules! assert_matches {
        ($left: expr, $right:pat $(if $guard:expr)? $(,)?) => {
            #[allow(unused)]
            {
                assert!(matches!($left, $right $(if $guard)?));
            }
        };
    }

    #[test]
    fn store_outputs_received_bundles_in_order() {
        let mut store = BundleSet::new();
        for i in [3, 0, 2, 1] {
            assert!(store.push(Msg(i, 10 + i as u8)).unwrap());
        }
        assert_eq!(store.len(), 4);
        assert_eq!(store.take(), vec![Msg(0, 10), Msg(1, 11), Msg(2, 12), Msg(3, 13)]);
        assert!(store.is_empty());
    }

    #[test]
    fn store_ignores_exact_copies() {
        let mut store = BundleSet::new();
        assert!(store.push(Msg(1, 7)).unwrap());
        assert!(!store.push(Msg(1, 7)).unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.bad().is_empty());
    }

    #[test]
    fn store_returns_error_if_issuer_equivocates() {
        let mut store = BundleSet::new();
        store.push(Msg(1, 11)).unwrap();
        store.push(Msg(2, 22)).unwrap();
        let error = store.push(Msg(1, 12)).unwrap_err();
        assert_matches!(error, StoreError::Equivocation(issuer) if issuer == 1);
        assert_matches!(store.push(Msg(1, 11)), Err(StoreError::BadIssuer(1)));

        assert_eq!(store.take(), vec![Msg(2, 22)]);
        assert!(store.bad().contains(&1));
    }
}
