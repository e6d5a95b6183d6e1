//! Setup registry: maps a dataname and its parameters to the responsible setup.
//!
//! Setups are registered by name at startup. A route table can pin datanames
//! to a setup name (optionally depending on parameter values); everything else
//! is found through the `algorithm` parameter.

use crate::error::DispenseError;
use crate::params::Pars;
use crate::setup::Setup;
use std::collections::HashMap;
use std::sync::Arc;

/// Parameter key naming the algorithm whose setup serves a dataname
pub const ALGORITHM_KEY: &str = "algorithm";

/// Suffix appended to the algorithm name to form a setup name
pub const SETUP_SUFFIX: &str = "_setup";

type Route = Box<dyn Fn(&Pars) -> Option<String> + Send + Sync>;

/// A setup together with the name it was resolved under
#[derive(Clone)]
pub struct ResolvedSetup {
    pub name: String,
    pub setup: Arc<dyn Setup>,
}

impl std::fmt::Debug for ResolvedSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSetup").field("name", &self.name).finish()
    }
}

/// Registry of setups and dataname routes
#[derive(Default)]
pub struct SetupRegistry {
    setups: HashMap<String, Arc<dyn Setup>>,
    routes: HashMap<String, Route>,
}

impl SetupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a setup under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, setup: Arc<dyn Setup>) {
        self.setups.insert(name.into(), setup);
    }

    /// Builder-style `register`
    pub fn with_setup(mut self, name: impl Into<String>, setup: Arc<dyn Setup>) -> Self {
        self.register(name, setup);
        self
    }

    /// Route `dataname` through `route`. Returning `None` from the route
    /// defers to the algorithm-derived lookup.
    pub fn route<F>(&mut self, dataname: impl Into<String>, route: F)
    where
        F: Fn(&Pars) -> Option<String> + Send + Sync + 'static,
    {
        self.routes.insert(dataname.into(), Box::new(route));
    }

    /// Route `dataname` to a fixed setup name.
    pub fn route_to(&mut self, dataname: impl Into<String>, setup_name: impl Into<String>) {
        let setup_name = setup_name.into();
        self.route(dataname, move |_| Some(setup_name.clone()));
    }

    /// Registered setup names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.setups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Setup>> {
        self.setups.get(name)
    }

    /// Resolve the setup serving `dataname` under `pars`
    ///
    /// Order:
    /// 1. route table entry for `dataname`, if it yields a name
    /// 2. `{algorithm}_setup`
    /// 3. `{algorithm}::{algorithm}_setup`
    pub fn resolve(&self, dataname: &str, pars: &Pars) -> Result<ResolvedSetup, DispenseError> {
        if let Some(route) = self.routes.get(dataname) {
            if let Some(name) = route(pars).filter(|n| !n.is_empty()) {
                return self.lookup(dataname, &name);
            }
        }

        let algorithm = match pars.get(ALGORITHM_KEY) {
            Some(value) => value.as_str().ok_or_else(|| {
                DispenseError::Configuration(format!(
                    "Parameter '{}' must be a string, got {}",
                    ALGORITHM_KEY, value
                ))
            })?,
            None => {
                return Err(DispenseError::Configuration(format!(
                    "No route for dataname '{}' and no '{}' parameter to derive a setup from",
                    dataname, ALGORITHM_KEY
                )))
            }
        };

        let flat = format!("{}{}", algorithm, SETUP_SUFFIX);
        if self.setups.contains_key(&flat) {
            return self.lookup(dataname, &flat);
        }
        let nested = format!("{}::{}", algorithm, flat);
        if self.setups.contains_key(&nested) {
            return self.lookup(dataname, &nested);
        }

        Err(DispenseError::PluginNotFound {
            dataname: dataname.to_string(),
            tried: format!("{}, {}", flat, nested),
        })
    }

    fn lookup(&self, dataname: &str, name: &str) -> Result<ResolvedSetup, DispenseError> {
        let setup = self
            .setups
            .get(name)
            .ok_or_else(|| DispenseError::PluginNotFound {
                dataname: dataname.to_string(),
                tried: name.to_string(),
            })?;
        Ok(ResolvedSetup {
            name: name.to_string(),
            setup: Arc::clone(setup),
        })
    }
}
