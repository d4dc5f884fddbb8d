//! The process-wide suite registry.
//!
//! The registry is installed at most once per process with [`Registry::init`]; anything that
//! asks for it before that gets the permissive default. After installation it is read-only.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::suite::SuiteId;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Errors raised by suite lookups.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum RegistryError {
    /// unknown suite `{0}`
    UnknownSuite(String),
    /// suite `{0}` has variable time operations and the registry only allows constant time suites
    VariableTime(String),
    /// the suite registry is already initialized
    AlreadyInitialized,
}

/// Which suites a registry hands out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// Every registered suite.
    #[default]
    AllowVariableTime,
    /// Only suites whose backends run in constant time.
    ConstantTimeOnly,
}

/// Name to suite mapping, case-insensitive on lookup.
#[derive(Debug, Clone)]
pub struct Registry {
    policy: Policy,
    suites: BTreeMap<String, SuiteId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}

impl Registry {
    /// A registry holding every suite the crate ships.
    pub fn new(policy: Policy) -> Self {
        let suites = SuiteId::ALL.into_iter().map(|id| (id.name().to_ascii_lowercase(), id)).collect();
        Self { policy, suites }
    }

    /// Installs the process-wide registry.
    ///
    /// Fails with [`RegistryError::AlreadyInitialized`] once a registry is in place, including
    /// the default one installed by an earlier call to [`Registry::global`].
    pub fn init(policy: Policy) -> Result<&'static Registry, RegistryError> {
        let mut installed = false;
        let registry = REGISTRY.get_or_init(|| {
            installed = true;
            Registry::new(policy)
        });
        if !installed {
            return Err(RegistryError::AlreadyInitialized);
        }
        log::debug!(target: "kyber::registry", "installed suite registry with policy {policy:?}");
        Ok(registry)
    }

    /// The process-wide registry, installing the default one if none is there yet.
    pub fn global() -> &'static Registry {
        REGISTRY.get_or_init(Registry::default)
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Looks a suite up by name, ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> Result<SuiteId, RegistryError> {
        let id = self
            .suites
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownSuite(name.to_owned()))?;
        self.check(id)
    }

    /// Checks `id` against the policy.
    pub fn check(&self, id: SuiteId) -> Result<SuiteId, RegistryError> {
        if self.policy == Policy::ConstantTimeOnly && !id.is_constant_time() {
            log::warn!(target: "kyber::registry", "refusing variable time suite {id}");
            return Err(RegistryError::VariableTime(id.name().to_owned()));
        }
        Ok(id)
    }

    /// Canonical names of the suites the policy allows, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.suites.values().filter(|id| self.check(**id).is_ok()).map(|id| id.name()).collect();
        names.sort_unstable();
        names
    }
}
