//! In-progress request trail
//!
//! Every recursive pass (defaults, identity, generation) walks the
//! prerequisite graph depth-first. The trail records the `(dataname, pars)`
//! requests currently on the stack so that a request reached again from
//! inside itself fails with `CyclicDependency` instead of recursing forever.

use crate::error::DispenseError;
use crate::params::{self, Pars};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Default)]
pub struct Trail {
    stack: Vec<(String, String)>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push `(dataname, pars)`; the returned guard pops it again on drop.
    pub fn enter(&mut self, dataname: &str, pars: &Pars) -> Result<TrailGuard<'_>, DispenseError> {
        let key = params::digest(dataname, pars);
        if let Some(start) = self.stack.iter().position(|(_, k)| *k == key) {
            let mut chain: Vec<&str> = self.stack[start..].iter().map(|(d, _)| d.as_str()).collect();
            chain.push(dataname);
            return Err(DispenseError::CyclicDependency(chain.join(" -> ")));
        }
        self.stack.push((dataname.to_string(), key));
        Ok(TrailGuard { trail: self })
    }
}

/// Scope of one request on the trail
pub struct TrailGuard<'a> {
    trail: &'a mut Trail,
}

impl Deref for TrailGuard<'_> {
    type Target = Trail;

    fn deref(&self) -> &Trail {
        self.trail
    }
}

impl DerefMut for TrailGuard<'_> {
    fn deref_mut(&mut self) -> &mut Trail {
        self.trail
    }
}

impl Drop for TrailGuard<'_> {
    fn drop(&mut self) {
        self.trail.stack.pop();
    }
}
