//! Operation registry: integer code to handler.

use crate::operation::Operation;
use crate::operations::{HypotenuseOperation, ShutdownOperation, HYPOTENUSE_OPERATION};
use jsonwire_protocol::SHUTDOWN_OPERATION;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

/// Maps operation codes to their handlers.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<i64, Arc<dyn Operation>>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in operations.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SHUTDOWN_OPERATION, ShutdownOperation);
        registry.register(HYPOTENUSE_OPERATION, HypotenuseOperation);
        registry
    }

    /// Registers `operation` under `code`, returning the handler it replaced.
    pub fn register<O>(&mut self, code: i64, operation: O) -> Option<Arc<dyn Operation>>
    where
        O: Operation + 'static,
    {
        self.operations.insert(code, Arc::new(operation))
    }

    pub fn unregister(&mut self, code: i64) -> Option<Arc<dyn Operation>> {
        self.operations.remove(&code)
    }

    pub fn get(&self, code: i64) -> Option<Arc<dyn Operation>> {
        self.operations.get(&code).cloned()
    }

    pub fn contains(&self, code: i64) -> bool {
        self.operations.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered codes, ascending.
    pub fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.operations.keys().copied()
    }

    /// Renders one `<code>: <description>` line per operation, ascending.
    pub fn list_operations(&self) -> String {
        let mut out = String::new();
        for (code, operation) in &self.operations {
            let _ = writeln!(out, "{}: {}", code, operation.description());
        }
        out
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("codes", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}
