//! Memogen: Memoizing Data Generation
//!
//! Named data products are built by registered setups from parameter sets.
//! Requests are resolved against declared defaults, reduced to the parameters
//! that identify the artifact, served from a store when already generated, and
//! otherwise generated after their prerequisites, with a log file per artifact.

pub mod cli;
pub mod config;
pub mod dispenser;
pub mod error;
pub mod identity;
pub mod logging;
pub mod params;
pub mod registry;
pub mod resolve;
pub mod setup;
pub mod store;
pub mod trail;

pub use dispenser::{core_parameters, Dispenser, DEBUG_KEY, STORE_DATA_KEY};
pub use error::{DispenseError, StorageError};
pub use identity::compute_identity;
pub use logging::ArtifactLog;
pub use params::{IdPars, Pars};
pub use registry::SetupRegistry;
pub use resolve::{resolve_defaults, resolve_defaults_in_place};
pub use setup::{Artifact, Identity, ParKind, ParamSpec, ParameterSpec, Prerequisite, Setup};
pub use store::{ArtifactStore, FsStore, MemoryStore, SledArtifactStore};
