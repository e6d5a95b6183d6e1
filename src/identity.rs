//! Identity parameter computation
//!
//! Reduces a fully resolved parameter set to the parameters that decide which
//! stored artifact a request refers to. Callers must resolve defaults for the
//! requested dataname first. Prerequisite parameters are resolved here, the same
//! way the dispenser resolves them before fetching, so a parent merges the keys
//! its prerequisites are stored under.

use crate::error::DispenseError;
use crate::params::{IdPars, Pars};
use crate::registry::SetupRegistry;
use crate::resolve;
use crate::trail::Trail;
use tracing::debug;

/// Suffix of the synthetic identity key carrying a setup's version
pub const VERSION_SUFFIX: &str = "_version";

/// Compute the identity parameters of `(dataname, pars)`
///
/// Prerequisite identities are merged in prerequisite order (later ones win),
/// then this setup's identity-relevant parameters overwrite them, then the
/// version key is added, then the setup's finalize hook runs.
pub fn compute_identity(
    registry: &SetupRegistry,
    dataname: &str,
    pars: &Pars,
) -> Result<IdPars, DispenseError> {
    let mut trail = Trail::new();
    identity(registry, &mut trail, dataname, pars)
}

/// Name of the version key for a setup registered as `setup_name`
pub fn version_key(setup_name: &str) -> String {
    format!("{}{}", setup_name, VERSION_SUFFIX)
}

fn identity(
    registry: &SetupRegistry,
    trail: &mut Trail,
    dataname: &str,
    pars: &Pars,
) -> Result<IdPars, DispenseError> {
    let mut trail = trail.enter(dataname, pars)?;
    let resolved = registry.resolve(dataname, pars)?;
    let setup = &resolved.setup;

    let mut idpars = IdPars::new();
    for prereq in setup.prerequisites(dataname, pars)? {
        let mut prereq_pars = prereq.pars;
        resolve::fill(registry, &mut trail, &prereq.dataname, &mut prereq_pars)?;
        let prereq_idpars = identity(registry, &mut trail, &prereq.dataname, &prereq_pars)?;
        idpars.update(&prereq_idpars);
    }

    for (name, spec) in setup.parameters().iter() {
        if spec.identity.holds(dataname, pars) {
            let value = pars.require(dataname, name)?;
            idpars.insert(name.clone(), value.clone());
        }
    }

    if let Some(version) = setup.version() {
        idpars.insert(version_key(&resolved.name), version);
    }

    let idpars = setup.finalize_identity(pars, idpars);

    debug!(
        dataname,
        setup = %resolved.name,
        keys = idpars.len(),
        "Computed identity parameters"
    );

    Ok(idpars)
}
