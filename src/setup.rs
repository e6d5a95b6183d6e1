//! Setup contract
//!
//! A setup describes one family of datanames: which parameters it reads (with
//! defaults and identity rules), which other artifacts it needs first, and how
//! to generate its own artifact from them. The engine only ever talks to
//! setups through this trait.

use crate::error::DispenseError;
use crate::logging::ArtifactLog;
use crate::params::{IdPars, ParValue, Pars};
use serde_json::Value;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// Generated artifact. Opaque to the engine; setups pick the shape.
pub type Artifact = Value;

/// Identity predicate signature: `(dataname, resolved pars) -> bool`.
///
/// A plain function pointer, so predicates cannot capture state.
pub type IdentityFn = fn(&str, &Pars) -> bool;

/// Whether a parameter takes part in the cache key
#[derive(Clone, Copy)]
pub enum Identity {
    Always,
    Never,
    /// Conditional identity, e.g. only when a feature flag enables the parameter.
    When(IdentityFn),
}

impl Identity {
    pub fn holds(&self, dataname: &str, pars: &Pars) -> bool {
        match self {
            Identity::Always => true,
            Identity::Never => false,
            Identity::When(predicate) => predicate(dataname, pars),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Always => write!(f, "Always"),
            Identity::Never => write!(f, "Never"),
            Identity::When(_) => write!(f, "When(..)"),
        }
    }
}

/// Declared value shape of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParKind {
    Any,
    Bool,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl ParKind {
    /// Kind implied by a default value. Numbers map to `Number` so that an
    /// integer default still accepts fractional input.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ParKind::Bool,
            Value::Number(_) => ParKind::Number,
            Value::String(_) => ParKind::String,
            Value::Array(_) => ParKind::Array,
            Value::Object(_) => ParKind::Object,
            Value::Null => ParKind::Any,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParKind::Any => true,
            ParKind::Bool => value.is_boolean(),
            ParKind::Integer => value.is_i64() || value.is_u64(),
            ParKind::Number => value.is_number(),
            ParKind::String => value.is_string(),
            ParKind::Array => value.is_array(),
            ParKind::Object => value.is_object(),
        }
    }

    /// Short name of the shape of `value`, for error messages.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for ParKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParKind::Any => "any",
            ParKind::Bool => "bool",
            ParKind::Integer => "integer",
            ParKind::Number => "number",
            ParKind::String => "string",
            ParKind::Array => "array",
            ParKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Metadata for one declared parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// `None` marks a required parameter.
    pub default: Option<ParValue>,
    pub identity: Identity,
    pub kind: ParKind,
}

impl ParamSpec {
    /// Parameter with a default; identity-relevant, kind inferred from the default.
    pub fn new(default: impl Into<ParValue>) -> Self {
        let default = default.into();
        Self {
            kind: ParKind::of(&default),
            default: Some(default),
            identity: Identity::Always,
        }
    }

    /// Parameter without a default. Resolution fails if nobody supplies it.
    pub fn required(kind: ParKind) -> Self {
        Self {
            default: None,
            identity: Identity::Always,
            kind,
        }
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Identity-relevant only when `predicate` holds.
    pub fn id_when(self, predicate: IdentityFn) -> Self {
        self.identity(Identity::When(predicate))
    }

    /// Never part of the cache key (verbosity, tuning knobs, ...).
    pub fn not_id(self) -> Self {
        self.identity(Identity::Never)
    }

    pub fn kind(mut self, kind: ParKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Parameter metadata of a setup, keyed by parameter name
#[derive(Debug, Clone, Default)]
pub struct ParameterSpec(BTreeMap<String, ParamSpec>);

impl ParameterSpec {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.0.get(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fill every declared default that `pars` does not already carry.
    pub fn apply_defaults(&self, pars: &mut Pars) {
        for (name, spec) in &self.0 {
            if let Some(default) = &spec.default {
                if !pars.contains(name) {
                    pars.insert(name.clone(), default.clone());
                }
            }
        }
    }

    /// Check that every declared parameter is present and of the declared kind.
    pub fn validate(&self, dataname: &str, pars: &Pars) -> Result<(), DispenseError> {
        for (name, spec) in &self.0 {
            let value = pars.require(dataname, name)?;
            if !spec.kind.matches(value) {
                return Err(DispenseError::InvalidParameter {
                    dataname: dataname.to_string(),
                    parameter: name.clone(),
                    expected: spec.kind.to_string(),
                    found: ParKind::describe(value).to_string(),
                });
            }
        }
        Ok(())
    }
}

/// An artifact that must exist before the current one can be generated
#[derive(Debug, Clone, PartialEq)]
pub struct Prerequisite {
    pub dataname: String,
    pub pars: Pars,
}

impl Prerequisite {
    pub fn new(dataname: impl Into<String>, pars: Pars) -> Self {
        Self {
            dataname: dataname.into(),
            pars,
        }
    }
}

/// Per-artifact-type plugin
///
/// Implementations must be deterministic: the same dataname and resolved
/// parameters always yield the same prerequisites and the same artifact.
pub trait Setup: Send + Sync {
    /// Declared parameters with defaults and identity rules
    fn parameters(&self) -> &ParameterSpec;

    /// Artifacts needed before `dataname` can be generated, in the order
    /// `generate` expects their results. Empty for source artifacts.
    fn prerequisites(&self, dataname: &str, pars: &Pars) -> Result<Vec<Prerequisite>, DispenseError>;

    /// Generate the artifact. `inputs` holds the prerequisite results in
    /// prerequisite order; `log` writes to the artifact's own log file.
    fn generate(
        &self,
        dataname: &str,
        inputs: Vec<Artifact>,
        pars: &Pars,
        log: &ArtifactLog,
    ) -> Result<Artifact, DispenseError>;

    /// Bumping the version invalidates every stored artifact of this setup.
    fn version(&self) -> Option<u64> {
        None
    }

    /// Last chance to normalize the identity parameters, e.g. to map
    /// equivalent parameter combinations onto one key.
    fn finalize_identity(&self, _pars: &Pars, idpars: IdPars) -> IdPars {
        idpars
    }
}
