//! Storage for a builder's operations.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::BuildError;
use crate::instance::Instance;
use crate::operation::{Definition, OpOptions, Operation};
use crate::subject::Subject;

/// Operations owned by one builder, keyed by unique name.
///
/// Declaration order is kept for introspection.
pub struct OperationRegistry<T: Subject> {
    operations: FxHashMap<String, Arc<Operation<T>>>,
    order: Vec<String>,
}

impl<T: Subject> Default for OperationRegistry<T> {
    fn default() -> Self {
        Self {
            operations: FxHashMap::default(),
            order: Vec::new(),
        }
    }
}

impl<T: Subject> OperationRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the operation described by `definition`.
    ///
    /// `defaults` fills any option the definition leaves unset. Fails if the
    /// definition has no behavior or its name is already taken; the registry
    /// is unchanged on failure.
    pub fn define(
        &mut self,
        subject: &'static str,
        definition: Definition<T>,
        defaults: &OpOptions,
    ) -> Result<Arc<Operation<T>>, BuildError> {
        if self.operations.contains_key(definition.name()) {
            // Missing behavior is reported before duplicates.
            if !definition.has_behavior() {
                return Err(BuildError::MissingBehavior {
                    subject,
                    name: definition.name().to_owned(),
                });
            }
            return Err(BuildError::DuplicateOperation {
                subject,
                name: definition.name().to_owned(),
            });
        }

        let operation = Arc::new(definition.into_operation(subject, defaults)?);
        self.order.push(operation.name().to_owned());
        self.operations
            .insert(operation.name().to_owned(), Arc::clone(&operation));
        Ok(operation)
    }

    /// Looks up an operation by name.
    pub fn get(&self, name: &str) -> Option<Arc<Operation<T>>> {
        self.operations.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Iterates over all operations in declaration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Operation<T>>> {
        self.order.iter().filter_map(|name| self.operations.get(name))
    }

    /// Iterates over operation names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Installs operations on `instance` so they are callable outside a block.
    ///
    /// With `persistent_only`, only persistent operations are installed.
    /// Installation is per instance and idempotent. Returns the number of
    /// newly installed operations.
    pub fn install(&self, instance: &mut Instance<T>, persistent_only: bool) -> usize {
        let mut installed = 0;
        for op in self.all() {
            if (!persistent_only || op.is_persistent()) && instance.install(op.name()) {
                installed += 1;
            }
        }
        installed
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lamp {
        on: bool,
    }

    impl Subject for Lamp {
        type Args = ();
        fn construct(_: ()) -> Self {
            Lamp::default()
        }
    }

    fn toggle() -> Definition<Lamp> {
        Definition::new("toggle").behavior(|scope: &mut crate::scope::Scope<'_, Lamp>, (): ()| {
            scope.on = !scope.on;
            Ok(())
        })
    }

    #[test]
    fn test_define_and_lookup() {
        let mut registry = OperationRegistry::<Lamp>::new();
        registry
            .define("Lamp", toggle(), &OpOptions::default())
            .unwrap();
        registry
            .define(
                "Lamp",
                Definition::new("brightness")
                    .persist(true)
                    .behavior(|_scope, (): ()| Ok(100u8)),
                &OpOptions::default(),
            )
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("toggle"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["toggle", "brightness"]);
    }

    #[test]
    fn test_duplicate_name_fails() {
        let mut registry = OperationRegistry::<Lamp>::new();
        registry
            .define("Lamp", toggle(), &OpOptions::default())
            .unwrap();

        let result = registry.define("Lamp", toggle(), &OpOptions::default());
        assert!(matches!(result, Err(BuildError::DuplicateOperation { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_behavior_fails() {
        let mut registry = OperationRegistry::<Lamp>::new();
        let result = registry.define("Lamp", Definition::new("toggle"), &OpOptions::default());

        assert!(matches!(result, Err(BuildError::MissingBehavior { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_defaults_apply() {
        let mut registry = OperationRegistry::<Lamp>::new();
        let op = registry
            .define("Lamp", toggle(), &OpOptions::new().persist(true))
            .unwrap();
        assert!(op.is_persistent());
    }

    #[test]
    fn test_install_persistent_only() {
        let mut registry = OperationRegistry::<Lamp>::new();
        registry
            .define("Lamp", toggle(), &OpOptions::default())
            .unwrap();
        registry
            .define(
                "Lamp",
                Definition::new("on").persist(true).behavior(|scope: &mut crate::scope::Scope<'_, Lamp>, (): ()| Ok(scope.on)),
                &OpOptions::default(),
            )
            .unwrap();

        let mut lamp = Instance::bare(Lamp::default());
        assert_eq!(registry.install(&mut lamp, true), 1);
        assert!(lamp.is_installed("on"));
        assert!(!lamp.is_installed("toggle"));

        // Idempotent, and a second pass only adds what is missing.
        assert_eq!(registry.install(&mut lamp, true), 0);
        assert_eq!(registry.install(&mut lamp, false), 1);
        assert!(lamp.is_installed("toggle"));

        // Other instances are unaffected.
        let other = Instance::bare(Lamp::default());
        assert!(!other.is_installed("on"));
    }
}
