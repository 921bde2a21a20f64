//! Compiled program cache
//!
//! Programs are keyed by Rust type and transfer syntax. Compilation runs
//! outside the lock; when two threads compile the same type concurrently the
//! first program stored wins and both get it back.

use crate::compile::Program;
use crate::options::TransferSyntax;
use crate::{NdrType, Result};
use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type CacheKey = (TypeId, TransferSyntax);

/// Thread-safe map from type to compiled program
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: RwLock<HashMap<CacheKey, Arc<Program>>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: NdrType>(&self, syntax: TransferSyntax) -> Option<Arc<Program>> {
        self.programs.read().get(&(TypeId::of::<T>(), syntax)).cloned()
    }

    /// Store a program for `T`, replacing any previous one.
    pub fn insert<T: NdrType>(&self, program: Program) -> Arc<Program> {
        let program = Arc::new(program);
        self.programs
            .write()
            .insert((TypeId::of::<T>(), program.syntax()), Arc::clone(&program));
        program
    }

    /// Cached program for `T`, compiling it on first use.
    pub fn get_or_compile<T: NdrType>(&self, syntax: TransferSyntax) -> Result<Arc<Program>> {
        if let Some(program) = self.get::<T>(syntax) {
            return Ok(program);
        }

        let compiled = Arc::new(Program::compile(&T::shape(), syntax)?);
        let mut programs = self.programs.write();
        let program = programs
            .entry((TypeId::of::<T>(), syntax))
            .or_insert_with(|| {
                debug!(type_name = type_name::<T>(), ?syntax, "caching NDR program");
                compiled
            });
        Ok(Arc::clone(program))
    }

    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.read().is_empty()
    }

    pub fn clear(&self) {
        self.programs.write().clear();
    }
}
