//! Shared setups and store wrappers for integration tests

use memogen::store::RecordInfo;
use memogen::{
    Artifact, ArtifactLog, ArtifactStore, DispenseError, IdPars, ParamSpec, ParameterSpec, Pars,
    Prerequisite, Setup, SetupRegistry, StorageError,
};
use parking_lot::Mutex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Small tensor-network style chain:
///
/// - `ham`: leaf
/// - `A`: needs `ham` (built without `chi`, so every `A` shares one `ham`)
/// - `As`: needs `A` at `chi` and at `2 * chi`, in that order
/// - `fail`: needs `ham`, then fails
/// - `loop_a` / `loop_b`: need each other
pub struct ChainSetup {
    parameters: ParameterSpec,
    calls: Mutex<Vec<String>>,
}

impl ChainSetup {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSpec::new()
                .param("model", ParamSpec::new("ising"))
                .param("beta", ParamSpec::new(0.44))
                .param("chi", ParamSpec::new(8))
                .param("verbosity", ParamSpec::new(0).not_id()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Datanames generated so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, dataname: &str) -> usize {
        self.calls.lock().iter().filter(|d| *d == dataname).count()
    }
}

fn ham_pars(dataname: &str, pars: &Pars) -> Result<Pars, DispenseError> {
    Ok(Pars::new()
        .with("algorithm", pars.require(dataname, "algorithm")?.clone())
        .with("model", pars.require(dataname, "model")?.clone())
        .with("beta", pars.require(dataname, "beta")?.clone()))
}

impl Setup for ChainSetup {
    fn parameters(&self) -> &ParameterSpec {
        &self.parameters
    }

    fn prerequisites(&self, dataname: &str, pars: &Pars) -> Result<Vec<Prerequisite>, DispenseError> {
        match dataname {
            "ham" => Ok(Vec::new()),
            "A" | "fail" => Ok(vec![Prerequisite::new("ham", ham_pars(dataname, pars)?)]),
            "As" => {
                let chi = pars.get_i64("chi").unwrap_or(8);
                Ok(vec![
                    Prerequisite::new("A", pars.clone()),
                    Prerequisite::new("A", pars.clone().with("chi", chi * 2)),
                ])
            }
            "loop_a" => Ok(vec![Prerequisite::new("loop_b", pars.clone())]),
            "loop_b" => Ok(vec![Prerequisite::new("loop_a", pars.clone())]),
            other => Err(DispenseError::unknown_dataname("chain", other)),
        }
    }

    fn generate(
        &self,
        dataname: &str,
        inputs: Vec<Artifact>,
        pars: &Pars,
        log: &ArtifactLog,
    ) -> Result<Artifact, DispenseError> {
        self.calls.lock().push(dataname.to_string());
        log.info(format!("generating {}", dataname));
        tracing::debug!(dataname, inputs = inputs.len(), "setup internals");

        match dataname {
            "ham" => Ok(json!({
                "model": pars.get_str("model"),
                "beta": pars.get_f64("beta"),
            })),
            "A" => Ok(json!({"chi": pars.get_i64("chi"), "ham": inputs[0]})),
            "As" => Ok(Artifact::Array(inputs)),
            "fail" => {
                log.error("truncation error above tolerance");
                Err(DispenseError::generation(dataname, "diverged"))
            }
            _ => Ok(Artifact::Null),
        }
    }
}

pub fn chain() -> (Arc<ChainSetup>, Arc<SetupRegistry>) {
    let setup = Arc::new(ChainSetup::new());
    let registry = SetupRegistry::new().with_setup("chain_setup", setup.clone());
    (setup, Arc::new(registry))
}

pub fn pars() -> Pars {
    Pars::new().with("algorithm", "chain")
}

/// Store wrapper counting every call that reaches the backend
pub struct CountingStore<S> {
    inner: S,
    pub exists: AtomicUsize,
    pub fetches: AtomicUsize,
    pub stores: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            exists: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            stores: AtomicUsize::new(0),
        }
    }

    pub fn total(&self) -> usize {
        self.exists.load(Ordering::SeqCst)
            + self.fetches.load(Ordering::SeqCst)
            + self.stores.load(Ordering::SeqCst)
    }
}

impl<S: ArtifactStore> ArtifactStore for CountingStore<S> {
    fn exists(&self, dataname: &str, idpars: &IdPars) -> Result<bool, StorageError> {
        self.exists.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(dataname, idpars)
    }

    fn fetch(&self, dataname: &str, idpars: &IdPars) -> Result<Artifact, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(dataname, idpars)
    }

    fn store(&self, artifact: &Artifact, dataname: &str, idpars: &IdPars) -> Result<(), StorageError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.inner.store(artifact, dataname, idpars)
    }

    fn path_for(&self, dataname: &str, idpars: &IdPars, extension: &str) -> Result<PathBuf, StorageError> {
        self.inner.path_for(dataname, idpars, extension)
    }

    fn list(&self) -> Result<Vec<RecordInfo>, StorageError> {
        self.inner.list()
    }
}
