//! Properties of default resolution and identity computation

use memogen::{
    compute_identity, resolve_defaults, Artifact, ArtifactLog, DispenseError, Dispenser, ParamSpec,
    ParameterSpec, Pars, Prerequisite, Setup, SetupRegistry,
};
use proptest::prelude::*;
use std::sync::Arc;

fn magnetic(_: &str, pars: &Pars) -> bool {
    pars.get_str("model") == Some("ising")
}

/// "mps" needs "ham"; both served by one setup.
struct LatticeSetup {
    parameters: ParameterSpec,
}

impl Setup for LatticeSetup {
    fn parameters(&self) -> &ParameterSpec {
        &self.parameters
    }

    fn prerequisites(&self, dataname: &str, pars: &Pars) -> Result<Vec<Prerequisite>, DispenseError> {
        match dataname {
            "ham" => Ok(Vec::new()),
            "mps" => Ok(vec![Prerequisite::new("ham", pars.clone())]),
            other => Err(DispenseError::unknown_dataname("lattice", other)),
        }
    }

    fn generate(
        &self,
        _: &str,
        _: Vec<Artifact>,
        _: &Pars,
        _: &ArtifactLog,
    ) -> Result<Artifact, DispenseError> {
        Ok(Artifact::Null)
    }
}

fn registry() -> Arc<SetupRegistry> {
    let setup = LatticeSetup {
        parameters: ParameterSpec::new()
            .param("model", ParamSpec::new("ising"))
            .param("chi", ParamSpec::new(16))
            .param("H", ParamSpec::new(0.0).id_when(magnetic))
            .param("verbosity", ParamSpec::new(0).not_id()),
    };
    Arc::new(SetupRegistry::new().with_setup("lattice_setup", Arc::new(setup)))
}

fn model() -> impl Strategy<Value = String> {
    prop_oneof![Just("ising".to_string()), Just("potts3".to_string()), Just("xxz".to_string())]
}

/// Partial parameter sets: every declared key may be absent.
fn partial_pars() -> impl Strategy<Value = Pars> {
    (
        proptest::option::of(model()),
        proptest::option::of(1i64..512),
        proptest::option::of(-2.0f64..2.0),
        proptest::option::of(0i64..4),
    )
        .prop_map(|(model, chi, h, verbosity)| {
            let mut pars = Pars::new().with("algorithm", "lattice");
            if let Some(model) = model {
                pars.insert("model", model);
            }
            if let Some(chi) = chi {
                pars.insert("chi", chi);
            }
            if let Some(h) = h {
                pars.insert("H", h);
            }
            if let Some(verbosity) = verbosity {
                pars.insert("verbosity", verbosity);
            }
            pars
        })
}

proptest! {
    #[test]
    fn prop_resolution_is_idempotent(pars in partial_pars()) {
        let registry = registry();
        let once = resolve_defaults(&registry, "mps", &pars).unwrap();
        let twice = resolve_defaults(&registry, "mps", &once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_resolution_keeps_supplied_values(pars in partial_pars()) {
        let registry = registry();
        let resolved = resolve_defaults(&registry, "mps", &pars).unwrap();
        for (key, value) in &pars {
            prop_assert_eq!(resolved.get(key), Some(value));
        }
        for key in ["model", "chi", "H", "verbosity"] {
            prop_assert!(resolved.contains(key));
        }
    }

    #[test]
    fn prop_overrides_do_not_touch_inputs(pars in partial_pars(), chi in 1i64..512) {
        let dispenser = Dispenser::new(registry());
        let before = pars.clone();
        let overrides = Pars::new().with("chi", chi);

        let resolved = dispenser.resolve_defaults("mps", &pars, &overrides).unwrap();

        prop_assert_eq!(&pars, &before);
        prop_assert_eq!(resolved.get_i64("chi"), Some(chi));
    }

    #[test]
    fn prop_identity_is_deterministic(pars in partial_pars(), verbosity in 0i64..10) {
        let registry = registry();
        let resolved = resolve_defaults(&registry, "mps", &pars).unwrap();
        let idpars = compute_identity(&registry, "mps", &resolved).unwrap();

        prop_assert_eq!(&idpars, &compute_identity(&registry, "mps", &resolved).unwrap());

        let louder = resolved.updated(&Pars::new().with("verbosity", verbosity));
        prop_assert_eq!(&idpars, &compute_identity(&registry, "mps", &louder).unwrap());
        prop_assert_eq!(idpars.contains("H"), resolved.get_str("model") == Some("ising"));
    }

    #[test]
    fn prop_digest_ignores_insertion_order(
        entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..8)
    ) {
        let forward: Pars = entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let backward: Pars = entries.iter().rev().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(
            memogen::params::digest("A", &forward),
            memogen::params::digest("A", &backward)
        );
    }
}
