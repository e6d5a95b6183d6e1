//! Default parameter resolution
//!
//! Fills a partial parameter set with every default that the setup serving a
//! dataname declares, plus every parameter its prerequisites end up with.
//! Precedence, highest first:
//!
//! 1. values supplied by the caller
//! 2. defaults declared by the setup serving `dataname`
//! 3. values inherited from prerequisites (first prerequisite wins)

use crate::error::DispenseError;
use crate::params::Pars;
use crate::registry::SetupRegistry;
use crate::trail::Trail;
use tracing::debug;

/// Resolve the full parameter set for `dataname`, leaving `pars` untouched.
pub fn resolve_defaults(
    registry: &SetupRegistry,
    dataname: &str,
    pars: &Pars,
) -> Result<Pars, DispenseError> {
    let mut resolved = pars.clone();
    resolve_defaults_in_place(registry, dataname, &mut resolved)?;
    Ok(resolved)
}

/// Augment `pars` in place. Keys already present are never changed.
pub fn resolve_defaults_in_place(
    registry: &SetupRegistry,
    dataname: &str,
    pars: &mut Pars,
) -> Result<(), DispenseError> {
    let mut trail = Trail::new();
    fill(registry, &mut trail, dataname, pars)
}

/// Resolve `pars` for `dataname` on an existing trail.
pub(crate) fn fill(
    registry: &SetupRegistry,
    trail: &mut Trail,
    dataname: &str,
    pars: &mut Pars,
) -> Result<(), DispenseError> {
    let mut trail = trail.enter(dataname, pars)?;
    let resolved = registry.resolve(dataname, pars)?;
    let spec = resolved.setup.parameters();

    // Own defaults first: prerequisite lists may depend on them.
    let mut working = pars.clone();
    spec.apply_defaults(&mut working);

    let prerequisites = resolved.setup.prerequisites(dataname, &working)?;
    let mut inherited = Pars::new();
    for prereq in prerequisites {
        let mut prereq_pars = prereq.pars;
        fill(registry, &mut trail, &prereq.dataname, &mut prereq_pars)?;
        inherited.fill_absent(&prereq_pars);
    }

    // Inherited values only land where neither the caller nor this setup spoke.
    working.fill_absent(&inherited);
    spec.validate(dataname, &working)?;

    debug!(
        dataname,
        setup = %resolved.name,
        inherited = inherited.len(),
        total = working.len(),
        "Resolved default parameters"
    );

    *pars = working;
    Ok(())
}
