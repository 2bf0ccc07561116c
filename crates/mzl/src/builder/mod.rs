//! Per-type builders.
//!
//! A [`Builder`] is the declaration and construction surface for one subject
//! type. Operations are declared once; every value built afterwards gets the
//! persistent ones installed, and construction blocks can call all of them.
//!
//! # Example
//!
//! ```rust
//! use mzl::{OpOptions, Registry, Subject};
//!
//! #[derive(Default)]
//! struct Server {
//!     port: u16,
//!     workers: u8,
//! }
//!
//! impl Subject for Server {
//!     type Args = u16;
//!     fn construct(port: u16) -> Self {
//!         Self { port, workers: 1 }
//!     }
//! }
//!
//! let registry = Registry::new();
//! let builder = registry.builder::<Server>();
//! builder
//!     .def("workers", OpOptions::new().persist(true), |scope, n: u8| {
//!         scope.workers = n;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut server = builder.new_with(8080, |s| s.call("workers", 4u8)).unwrap();
//! assert_eq!((server.port, server.workers), (8080, 4));
//!
//! // Persistent operations stay callable on the value itself.
//! server.call::<u8, ()>("workers", 8).unwrap();
//! assert_eq!(server.workers, 8);
//! ```

pub mod declare;

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::BuildError;
use crate::instance::Instance;
use crate::operation::{Category, Definition, OpOptions, Operation, OperationRegistry};
use crate::registry::{Registry, RegistryInner};
use crate::scope::{Scope, Visibility};
use crate::subject::Subject;
use crate::DEFAULT_EXPOSED_NAME;

pub use declare::{ChildOptions, CollectionOptions, Declaration, DeclarationKind};

/// Declaration and construction surface for the subject type `T`.
///
/// Obtained from [`Registry::builder`]; there is exactly one per type per
/// registry. All methods take `&self` and are safe to call from several
/// threads. No lock is held while a behavior or block runs.
pub struct Builder<T: Subject> {
    registry: Weak<RegistryInner>,
    operations: RwLock<OperationRegistry<T>>,
    defaults: RwLock<FxHashMap<Category, OpOptions>>,
    declarations: RwLock<Vec<Declaration>>,
    exposed_name: RwLock<String>,
    overridden: AtomicBool,
}

impl<T: Subject> Builder<T> {
    pub(crate) fn with_registry(registry: Weak<RegistryInner>) -> Self {
        Self {
            registry,
            operations: RwLock::new(OperationRegistry::new()),
            defaults: RwLock::new(FxHashMap::default()),
            declarations: RwLock::new(Vec::new()),
            exposed_name: RwLock::new(DEFAULT_EXPOSED_NAME.to_owned()),
            overridden: AtomicBool::new(false),
        }
    }

    /// Name of the subject type.
    pub fn subject_name(&self) -> &'static str {
        type_name::<T>()
    }

    /// The registry this builder belongs to.
    pub fn registry(&self) -> Result<Registry, BuildError> {
        Registry::upgrade(&self.registry).ok_or(BuildError::Detached {
            subject: self.subject_name(),
        })
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    /// Options merged into later declarations of `category`.
    pub fn defaults(&self, category: Category) -> OpOptions {
        self.defaults
            .read()
            .get(&category)
            .copied()
            .unwrap_or_default()
    }

    /// Replaces the defaults for `category`. Existing operations keep theirs.
    pub fn set_defaults(&self, category: Category, options: OpOptions) {
        self.defaults.write().insert(category, options);
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Registers an operation, merging in the defaults for [`Category::Def`].
    ///
    /// Fails with [`BuildError::MissingBehavior`] if the definition has no
    /// behavior and [`BuildError::DuplicateOperation`] if its name is taken.
    pub fn define(&self, definition: Definition<T>) -> Result<(), BuildError> {
        self.define_in(Category::Def, definition).map(|_| ())
    }

    /// Shorthand for [`Builder::define`] with a name, options and behavior.
    pub fn def<A, R, F>(
        &self,
        name: impl Into<String>,
        options: OpOptions,
        behavior: F,
    ) -> Result<(), BuildError>
    where
        A: 'static,
        R: 'static,
        F: Fn(&mut Scope<'_, T>, A) -> Result<R, BuildError> + Send + Sync + 'static,
    {
        self.define(Definition::new(name).options(options).behavior(behavior))
    }

    pub(crate) fn define_in(
        &self,
        category: Category,
        definition: Definition<T>,
    ) -> Result<Arc<Operation<T>>, BuildError> {
        let defaults = self.defaults(category);
        let operation = self
            .operations
            .write()
            .define(self.subject_name(), definition, &defaults)?;
        debug!(
            "{}: defined `{}` ({}, {})",
            self.subject_name(),
            operation.name(),
            if operation.is_persistent() { "persistent" } else { "call-scoped" },
            operation.signature()
        );
        Ok(operation)
    }

    /// Looks up an operation by name.
    pub fn operation(&self, name: &str) -> Option<Arc<Operation<T>>> {
        self.operations.read().get(name)
    }

    /// Returns true if an operation called `name` is registered.
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.read().contains(name)
    }

    /// Names of all registered operations, in declaration order.
    pub fn operation_names(&self) -> Vec<String> {
        self.operations.read().names().map(str::to_owned).collect()
    }

    /// Names of the persistent operations, in declaration order.
    pub fn persistent_names(&self) -> Vec<String> {
        self.operations
            .read()
            .all()
            .filter(|op| op.is_persistent())
            .map(|op| op.name().to_owned())
            .collect()
    }

    /// Child and collection declarations, in declaration order.
    pub fn declarations(&self) -> Vec<Declaration> {
        self.declarations.read().clone()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Constructs a value with [`Subject::construct`] and installs the
    /// persistent operations on it.
    pub fn new(self: &Arc<Self>, args: T::Args) -> Instance<T> {
        trace!("{}: new", self.subject_name());
        let mut instance = Instance::bare(T::construct(args));
        self.finish(&mut instance);
        instance
    }

    /// Constructs a value, installs every operation on it and runs `block`
    /// against it.
    ///
    /// If the block fails the value is dropped and the error returned.
    pub fn new_with<F>(self: &Arc<Self>, args: T::Args, block: F) -> Result<Instance<T>, BuildError>
    where
        F: FnOnce(&mut Scope<'_, T>) -> Result<(), BuildError>,
    {
        trace!("{}: new with block", self.subject_name());
        let mut instance = Instance::bare(T::construct(args));
        self.run(&mut instance, block)?;
        self.finish(&mut instance);
        Ok(instance)
    }

    /// Installs every registered operation on `instance`, then runs `block`
    /// against it.
    ///
    /// The operations stay installed after the block returns, whether or
    /// not it succeeds.
    pub fn run<F>(&self, instance: &mut Instance<T>, block: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Scope<'_, T>) -> Result<(), BuildError>,
    {
        let installed = self.operations.read().install(instance, false);
        trace!("{}: running block ({} newly installed)", self.subject_name(), installed);
        let mut scope = Scope::new(instance, self, Visibility::All);
        block(&mut scope)
    }

    /// Binds re-entry and installs persistent operations.
    fn finish(self: &Arc<Self>, instance: &mut Instance<T>) {
        instance.bind(Arc::clone(self), self.exposed_name());
        self.operations.read().install(instance, true);
    }

    // =========================================================================
    // Type-level wiring
    // =========================================================================

    /// Routes the type's standard entry point ([`Registry::create`],
    /// [`Subject::create`]) through [`Builder::new`] when `enable` is true,
    /// and back to plain [`Subject::construct`] when false.
    ///
    /// Returns the previous state. Only this subject type is affected.
    pub fn override_new(&self, enable: bool) -> bool {
        let previous = self.overridden.swap(enable, Ordering::AcqRel);
        if previous != enable {
            debug!(
                "{}: standard construction {}",
                self.subject_name(),
                if enable { "routed through builder" } else { "restored" }
            );
        }
        previous
    }

    /// Returns true if the standard entry point routes through this builder.
    pub fn is_overridden(&self) -> bool {
        self.overridden.load(Ordering::Acquire)
    }

    /// The name this builder is reachable under.
    pub fn exposed_name(&self) -> String {
        self.exposed_name.read().clone()
    }

    /// Changes the name this builder is reachable under. Returns the old name.
    ///
    /// Instances keep the name they were bound under when constructed.
    pub fn rename(&self, new_name: impl Into<String>) -> String {
        let new_name = new_name.into();
        let old = std::mem::replace(&mut *self.exposed_name.write(), new_name.clone());
        debug!("{}: exposed as `{}` (was `{}`)", self.subject_name(), new_name, old);
        old
    }
}

impl<T: Subject> fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("subject", &self.subject_name())
            .field("exposed_name", &self.exposed_name())
            .field("operations", &self.operation_names())
            .field("overridden", &self.is_overridden())
            .finish()
    }
}
