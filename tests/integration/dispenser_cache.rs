//! Integration tests for memoized generation through the Dispenser

use super::support::{chain, pars, CountingStore};
use memogen::logging::ArtifactLogLayer;
use memogen::store::LOG_EXTENSION;
use memogen::{ArtifactStore, DispenseError, Dispenser, FsStore, MemoryStore, Pars, STORE_DATA_KEY};
use serde_json::json;
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn fs_dispenser(temp_dir: &TempDir) -> (Arc<super::support::ChainSetup>, Dispenser, Arc<FsStore>) {
    let (setup, registry) = chain();
    let store = Arc::new(FsStore::new(temp_dir.path()).unwrap());
    (setup, Dispenser::with_store(registry, store.clone()), store)
}

#[test]
fn test_cache_hit_skips_generation() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, dispenser, _) = fs_dispenser(&temp_dir);

    let first = dispenser.get_data("A", &pars(), &Pars::new()).unwrap();
    let second = dispenser.get_data("A", &pars(), &Pars::new()).unwrap();

    assert_eq!(first, second);
    assert_eq!(setup.count("A"), 1);
    assert_eq!(setup.count("ham"), 1);
}

#[test]
fn test_store_survives_dispenser() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, registry) = chain();

    let first = Dispenser::with_store(registry.clone(), Arc::new(FsStore::new(temp_dir.path()).unwrap()));
    first.get_data("A", &pars(), &Pars::new()).unwrap();
    drop(first);

    let second = Dispenser::with_store(registry, Arc::new(FsStore::new(temp_dir.path()).unwrap()));
    let artifact = second.get_data("A", &pars(), &Pars::new()).unwrap();

    assert_eq!(artifact["chi"], json!(8));
    assert_eq!(setup.count("A"), 1);
}

#[test]
fn test_prerequisites_in_order_and_shared() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, dispenser, _) = fs_dispenser(&temp_dir);

    let artifact = dispenser.get_data("As", &pars(), &Pars::new()).unwrap();

    assert_eq!(setup.calls(), vec!["ham", "A", "A", "As"]);
    assert_eq!(artifact[0]["chi"], json!(8));
    assert_eq!(artifact[1]["chi"], json!(16));
    assert_eq!(artifact[0]["ham"], artifact[1]["ham"]);
}

#[test]
fn test_prerequisite_stored_under_resolved_identity() {
    let temp_dir = TempDir::new().unwrap();
    let (_, dispenser, store) = fs_dispenser(&temp_dir);

    dispenser.get_data("A", &pars(), &Pars::new()).unwrap();

    // "A" hands "ham" no chi; the stored key still carries ham's default.
    let ham = dispenser
        .resolve_defaults("ham", &pars().with("model", "ising").with("beta", 0.44), &Pars::new())
        .unwrap();
    let ham_idpars = dispenser.identity("ham", &ham).unwrap();
    assert_eq!(ham_idpars.get_i64("chi"), Some(8));
    assert!(store.exists("ham", &ham_idpars).unwrap());

    let a = dispenser.resolve_defaults("A", &pars(), &Pars::new()).unwrap();
    let a_idpars = dispenser.identity("A", &a).unwrap();
    assert!(store.exists("A", &a_idpars).unwrap());
}

#[test]
fn test_non_identity_override_is_a_cache_hit() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, dispenser, _) = fs_dispenser(&temp_dir);

    dispenser.get_data("A", &pars(), &Pars::new()).unwrap();
    dispenser
        .get_data("A", &pars(), &Pars::new().with("verbosity", 3))
        .unwrap();
    dispenser
        .get_data("A", &pars(), &Pars::new().with("chi", 12))
        .unwrap();

    assert_eq!(setup.count("A"), 2);
}

#[test]
fn test_store_data_false_never_touches_store() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, registry) = chain();
    let store = Arc::new(CountingStore::new(MemoryStore::new(temp_dir.path())));
    let dispenser = Dispenser::with_store(registry, store.clone());
    let overrides = Pars::new().with(STORE_DATA_KEY, false);

    dispenser.get_data("ham", &pars(), &overrides).unwrap();
    dispenser.get_data("ham", &pars(), &overrides).unwrap();

    assert_eq!(setup.count("ham"), 2);
    assert_eq!(store.total(), 0);
    assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none(), "no log file either");
}

#[test]
fn test_fetch_bypasses_generation_and_writes() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, registry) = chain();
    let store = Arc::new(CountingStore::new(MemoryStore::new(temp_dir.path())));
    let dispenser = Dispenser::with_store(registry, store.clone());

    dispenser.get_data("ham", &pars(), &Pars::new()).unwrap();
    assert_eq!(store.stores.load(Ordering::SeqCst), 1);

    dispenser.get_data("ham", &pars(), &Pars::new()).unwrap();
    assert_eq!(store.stores.load(Ordering::SeqCst), 1);
    assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(setup.count("ham"), 1);
}

#[test]
fn test_unknown_dataname_propagates() {
    let temp_dir = TempDir::new().unwrap();
    let (_, dispenser, _) = fs_dispenser(&temp_dir);

    match dispenser.get_data("Z", &pars(), &Pars::new()) {
        Err(DispenseError::UnknownDataname { setup, dataname }) => {
            assert_eq!(setup, "chain");
            assert_eq!(dataname, "Z");
        }
        other => panic!("Expected UnknownDataname, got {:?}", other),
    }
}

#[test]
fn test_missing_plugin() {
    let temp_dir = TempDir::new().unwrap();
    let (_, dispenser, _) = fs_dispenser(&temp_dir);
    let err = dispenser
        .get_data("A", &Pars::new().with("algorithm", "dmrg"), &Pars::new())
        .unwrap_err();
    assert!(matches!(err, DispenseError::PluginNotFound { .. }));
}

#[test]
fn test_failure_stores_nothing_and_keeps_log() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, dispenser, store) = fs_dispenser(&temp_dir);

    let err = dispenser.get_data("fail", &pars(), &Pars::new()).unwrap_err();
    assert!(matches!(err, DispenseError::Generation { .. }));

    let resolved = dispenser.resolve_defaults("fail", &pars(), &Pars::new()).unwrap();
    let idpars = dispenser.identity("fail", &resolved).unwrap();
    assert!(!store.exists("fail", &idpars).unwrap());
    assert_eq!(store.list().unwrap().len(), 1, "only the prerequisite was stored");

    let log = fs::read_to_string(store.path_for("fail", &idpars, LOG_EXTENSION).unwrap()).unwrap();
    assert!(log.contains("generating fail"));
    assert!(log.contains("truncation error above tolerance"));

    // A retry generates again and truncates the log of the failed attempt.
    assert!(dispenser.get_data("fail", &pars(), &Pars::new()).is_err());
    assert_eq!(setup.count("fail"), 2);
    assert_eq!(setup.count("ham"), 1);
    let log = fs::read_to_string(store.path_for("fail", &idpars, LOG_EXTENSION).unwrap()).unwrap();
    assert_eq!(log.matches("generating fail").count(), 1);
}

#[test]
fn test_log_file_collects_diagnostics() {
    let temp_dir = TempDir::new().unwrap();
    let (_, dispenser, store) = fs_dispenser(&temp_dir);
    let subscriber = Registry::default().with(ArtifactLogLayer::new());

    tracing::subscriber::with_default(subscriber, || {
        let debug_pars = pars().with("debug", true);
        dispenser.generate_data("A", &debug_pars).unwrap();

        let resolved = dispenser.resolve_defaults("A", &debug_pars, &Pars::new()).unwrap();
        let idpars = dispenser.identity("A", &resolved).unwrap();
        let path = store.path_for("A", &idpars, LOG_EXTENSION).unwrap();

        let log = fs::read_to_string(&path).unwrap();
        assert!(log.contains("generating A"));
        assert!(log.contains("Generating artifact"));
        assert!(log.contains("setup internals"));
        assert!(!log.contains("generating ham"), "prerequisites log to their own files");

        dispenser.generate_data("A", &pars()).unwrap();
        let log = fs::read_to_string(&path).unwrap();
        assert!(log.contains("generating A"));
        assert!(!log.contains("setup internals"), "DEBUG only with debug=true");
    });
}

#[test]
fn test_cycle_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (setup, dispenser, _) = fs_dispenser(&temp_dir);

    match dispenser.get_data("loop_a", &pars(), &Pars::new()) {
        Err(DispenseError::CyclicDependency(chain)) => {
            assert!(chain.contains("loop_a -> loop_b"), "chain was {}", chain)
        }
        other => panic!("Expected CyclicDependency, got {:?}", other),
    }
    assert!(setup.calls().is_empty());
}

#[test]
fn test_without_store_generates_every_time() {
    let (setup, registry) = chain();
    let dispenser = Dispenser::new(registry);

    let first = dispenser.get_data("As", &pars(), &Pars::new()).unwrap();
    let second = dispenser.get_data("As", &pars(), &Pars::new()).unwrap();

    assert_eq!(first, second);
    assert_eq!(setup.count("As"), 2);
    assert_eq!(setup.count("ham"), 4);
}
