use crate::error::{RegistryError, TransformError};
use crate::table::{ColumnSet, Table};
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

pub mod config;
pub mod transform;

pub use config::{NodeConfig, OneOrMany};
pub use transform::{Arity, FnTransform, NodeContext, NodeTransform};

/// Node type identifiers match case-insensitively, ignoring surrounding whitespace.
pub fn normalize_type(node_type: &str) -> String {
    node_type.trim().to_lowercase()
}

/// Maps node type identifiers to the transforms that implement them.
///
/// The registry is built once and shared read-only by every execution.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    transforms: AHashMap<String, Arc<dyn NodeTransform>>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in node type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::nodes::register_default_transforms(&mut registry);
        registry
    }

    /// Registers a transform under its own `node_type()`, replacing any
    /// earlier registration for that type.
    pub fn register(&mut self, transform: Arc<dyn NodeTransform>) {
        self.transforms
            .insert(normalize_type(transform.node_type()), transform);
    }

    /// Registers a transform under an explicit identifier.
    pub fn register_as(&mut self, node_type: &str, transform: Arc<dyn NodeTransform>) {
        self.transforms.insert(normalize_type(node_type), transform);
    }

    /// Registers a node type from a full-mode and a schema-mode closure.
    pub fn register_fn<R, C>(&mut self, node_type: &str, arity: Arity, run: R, columns: C)
    where
        R: Fn(&NodeContext, &[&Table], &NodeConfig) -> Result<Table, TransformError>
            + Send
            + Sync
            + 'static,
        C: Fn(&NodeContext, &[&ColumnSet], &NodeConfig) -> Result<ColumnSet, TransformError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Arc::new(FnTransform::new(node_type, arity, run, columns)));
    }

    /// Makes `user_type` resolve to the transform registered as `builtin_type`.
    pub fn alias(&mut self, user_type: &str, builtin_type: &str) -> Result<(), RegistryError> {
        let transform = self.lookup(builtin_type)?;
        self.register_as(user_type, transform);
        Ok(())
    }

    pub fn lookup(&self, node_type: &str) -> Result<Arc<dyn NodeTransform>, RegistryError> {
        self.transforms
            .get(&normalize_type(node_type))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.transforms.contains_key(&normalize_type(node_type))
    }

    /// Registered identifiers (aliases included), sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

