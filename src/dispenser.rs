//! Generation orchestration
//!
//! The [`Dispenser`] answers "give me `dataname` for these parameters": it
//! resolves defaults, derives the identity parameters, serves the artifact from
//! the store when present and otherwise generates it. Generation recursively
//! obtains every prerequisite first, runs the setup with an artifact log
//! attached, and persists the result.

use crate::config::{ArtifactLogConfig, MemogenConfig};
use crate::error::DispenseError;
use crate::identity::compute_identity;
use crate::logging::ArtifactLog;
use crate::params::{IdPars, Pars};
use crate::registry::SetupRegistry;
use crate::resolve::resolve_defaults_in_place;
use crate::setup::{Artifact, ParamSpec, ParameterSpec};
use crate::store::ArtifactStore;
use crate::trail::Trail;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, Level};

/// Core parameter: persist generated artifacts (and consult the store)
pub const STORE_DATA_KEY: &str = "store_data";

/// Parameter raising the artifact log level to DEBUG
pub const DEBUG_KEY: &str = "debug";

/// Parameters every request carries regardless of the serving setup
pub fn core_parameters() -> ParameterSpec {
    ParameterSpec::new().param(STORE_DATA_KEY, ParamSpec::new(true).not_id())
}

/// Memoizing front door over a setup registry and an optional store
pub struct Dispenser {
    registry: Arc<SetupRegistry>,
    store: Option<Arc<dyn ArtifactStore>>,
    artifact_log: ArtifactLogConfig,
}

impl Dispenser {
    /// Dispenser without a store: every request generates in memory
    pub fn new(registry: Arc<SetupRegistry>) -> Self {
        Self {
            registry,
            store: None,
            artifact_log: ArtifactLogConfig::default(),
        }
    }

    pub fn with_store(registry: Arc<SetupRegistry>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new(registry)
        }
    }

    /// Build from configuration, opening the configured store backend
    pub fn from_config(
        registry: Arc<SetupRegistry>,
        config: &MemogenConfig,
        workspace_root: &Path,
    ) -> Result<Self, DispenseError> {
        Ok(Self {
            registry,
            store: config.store.open(workspace_root)?,
            artifact_log: config.artifact_log.clone(),
        })
    }

    pub fn with_artifact_log(mut self, artifact_log: ArtifactLogConfig) -> Self {
        self.artifact_log = artifact_log;
        self
    }

    pub fn registry(&self) -> &SetupRegistry {
        &self.registry
    }

    pub fn store(&self) -> Option<&Arc<dyn ArtifactStore>> {
        self.store.as_ref()
    }

    /// Full parameter set for `dataname`: `pars` updated with `overrides`,
    /// then core and setup defaults filled in. Neither input is mutated.
    pub fn resolve_defaults(
        &self,
        dataname: &str,
        pars: &Pars,
        overrides: &Pars,
    ) -> Result<Pars, DispenseError> {
        let mut pars = pars.updated(overrides);
        let core = core_parameters();
        core.apply_defaults(&mut pars);
        core.validate(dataname, &pars)?;
        resolve_defaults_in_place(&self.registry, dataname, &mut pars)?;
        Ok(pars)
    }

    /// Identity parameters for already resolved `pars`
    pub fn identity(&self, dataname: &str, pars: &Pars) -> Result<IdPars, DispenseError> {
        compute_identity(&self.registry, dataname, pars)
    }

    /// Obtain `dataname`, from the store when possible
    pub fn get_data(
        &self,
        dataname: &str,
        pars: &Pars,
        overrides: &Pars,
    ) -> Result<Artifact, DispenseError> {
        let (artifact, _) = self.get_data_with_pars(dataname, pars, overrides)?;
        Ok(artifact)
    }

    /// Like [`Dispenser::get_data`], also returning the resolved parameters
    pub fn get_data_with_pars(
        &self,
        dataname: &str,
        pars: &Pars,
        overrides: &Pars,
    ) -> Result<(Artifact, Pars), DispenseError> {
        let mut trail = Trail::new();
        self.get(&mut trail, dataname, pars, overrides)
    }

    /// Generate `dataname` unconditionally, without looking in the store.
    ///
    /// Defaults are resolved first (resolution is idempotent). The result is
    /// persisted when a store is configured and `store_data` is true.
    pub fn generate_data(&self, dataname: &str, pars: &Pars) -> Result<Artifact, DispenseError> {
        let pars = self.resolve_defaults(dataname, pars, &Pars::new())?;
        let mut trail = Trail::new();
        self.generate(&mut trail, dataname, &pars, None)
    }

    fn get(
        &self,
        trail: &mut Trail,
        dataname: &str,
        pars: &Pars,
        overrides: &Pars,
    ) -> Result<(Artifact, Pars), DispenseError> {
        let pars = self.resolve_defaults(dataname, pars, overrides)?;

        let store = match self.persisting_store(&pars) {
            Some(store) => store,
            None => {
                debug!(dataname, "Store bypassed");
                let artifact = self.generate(trail, dataname, &pars, None)?;
                return Ok((artifact, pars));
            }
        };

        let idpars = compute_identity(&self.registry, dataname, &pars)?;
        if store.exists(dataname, &idpars)? {
            info!(dataname, "Serving stored artifact");
            let artifact = store.fetch(dataname, &idpars)?;
            return Ok((artifact, pars));
        }

        debug!(dataname, "No stored artifact, generating");
        let artifact = self.generate(trail, dataname, &pars, Some(idpars))?;
        Ok((artifact, pars))
    }

    /// `pars` must be resolved. `idpars` may carry an identity computed by the caller.
    fn generate(
        &self,
        trail: &mut Trail,
        dataname: &str,
        pars: &Pars,
        idpars: Option<IdPars>,
    ) -> Result<Artifact, DispenseError> {
        let mut trail = trail.enter(dataname, pars)?;
        let resolved = self.registry.resolve(dataname, pars)?;

        // Identity is fixed before prerequisites run.
        let target = match self.persisting_store(pars) {
            Some(store) => {
                let idpars = match idpars {
                    Some(idpars) => idpars,
                    None => compute_identity(&self.registry, dataname, pars)?,
                };
                Some((store, idpars))
            }
            None => None,
        };

        let prerequisites = resolved.setup.prerequisites(dataname, pars)?;
        let mut inputs = Vec::with_capacity(prerequisites.len());
        for prereq in prerequisites {
            let artifact = if self.store.is_some() {
                self.get(&mut trail, &prereq.dataname, &prereq.pars, &Pars::new())?.0
            } else {
                let prereq_pars = self.resolve_defaults(&prereq.dataname, &prereq.pars, &Pars::new())?;
                self.generate(&mut trail, &prereq.dataname, &prereq_pars, None)?
            };
            inputs.push(artifact);
        }

        let log = match &target {
            Some((store, idpars)) if self.artifact_log.enabled => {
                let path = store.path_for(dataname, idpars, &self.artifact_log.extension)?;
                ArtifactLog::open(&path, log_level(pars))?
            }
            _ => ArtifactLog::disabled(),
        };

        let outcome = {
            let _entered = log.enter();
            info!(
                dataname,
                setup = %resolved.name,
                inputs = inputs.len(),
                "Generating artifact"
            );
            resolved.setup.generate(dataname, inputs, pars, &log)
        };
        let closed = log.close();
        let artifact = outcome?;
        closed?;

        if let Some((store, idpars)) = target {
            store.store(&artifact, dataname, &idpars)?;
            info!(dataname, setup = %resolved.name, "Stored artifact");
        }

        Ok(artifact)
    }

    fn persisting_store(&self, pars: &Pars) -> Option<&Arc<dyn ArtifactStore>> {
        self.store
            .as_ref()
            .filter(|_| pars.get_bool(STORE_DATA_KEY).unwrap_or(true))
    }
}

fn log_level(pars: &Pars) -> Level {
    if pars.get_bool(DEBUG_KEY) == Some(true) {
        Level::DEBUG
    } else {
        Level::INFO
    }
}
