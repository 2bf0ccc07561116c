//! Type-keyed builder registry.
//!
//! A [`Registry`] owns one [`Builder`] per subject type. The process-wide
//! default is [`Registry::global`]; isolated registries from
//! [`Registry::new`] are useful in tests and when embedding.

use std::any::{TypeId, type_name};
use std::sync::{Arc, Weak};

use downcast_rs::{DowncastSync, impl_downcast};
use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::builder::Builder;
use crate::error::BuildError;
use crate::instance::Instance;
use crate::subject::Subject;

lazy_static! {
    static ref GLOBAL: Registry = Registry::new();
}

/// Introspection view of a builder, independent of its subject type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSummary {
    /// Full subject type name.
    pub subject: &'static str,
    pub exposed_name: String,
    /// All operations, in declaration order.
    pub operations: Vec<String>,
    /// Persistent operations, in declaration order.
    pub persistent: Vec<String>,
    pub overridden: bool,
}

/// Object-safe face of `Builder<T>`, so builders of different subjects can
/// share one map.
trait ErasedBuilder: DowncastSync {
    fn summary(&self) -> BuilderSummary;
}
impl_downcast!(sync ErasedBuilder);

impl<T: Subject> ErasedBuilder for Builder<T> {
    fn summary(&self) -> BuilderSummary {
        BuilderSummary {
            subject: self.subject_name(),
            exposed_name: self.exposed_name(),
            operations: self.operation_names(),
            persistent: self.persistent_names(),
            overridden: self.is_overridden(),
        }
    }
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    builders: RwLock<FxHashMap<TypeId, Arc<dyn ErasedBuilder>>>,
}

/// Shared handle to a set of builders, one per subject type.
///
/// Cloning is cheap; clones refer to the same builders.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Subject::builder`] and
    /// [`Subject::create`].
    pub fn global() -> &'static Registry {
        &*GLOBAL
    }

    pub(crate) fn upgrade(inner: &Weak<RegistryInner>) -> Option<Registry> {
        inner.upgrade().map(|inner| Registry { inner })
    }

    /// Returns the builder for `T`, creating it on first use.
    ///
    /// Repeated calls return the same builder.
    pub fn builder<T: Subject>(&self) -> Arc<Builder<T>> {
        if let Some(builder) = self.get::<T>() {
            return builder;
        }

        let mut builders = self.inner.builders.write();
        // Another thread may have created it between the two locks.
        if let Some(builder) = builders
            .get(&TypeId::of::<T>())
            .and_then(|builder| Arc::clone(builder).downcast_arc::<Builder<T>>().ok())
        {
            return builder;
        }

        debug!("creating builder for {}", type_name::<T>());
        let builder = Arc::new(Builder::<T>::with_registry(Arc::downgrade(&self.inner)));
        builders.insert(TypeId::of::<T>(), Arc::clone(&builder) as Arc<dyn ErasedBuilder>);
        builder
    }

    /// Returns the builder for `T` if one has been created.
    pub fn get<T: Subject>(&self) -> Option<Arc<Builder<T>>> {
        let builders = self.inner.builders.read();
        let builder = builders.get(&TypeId::of::<T>())?;
        Arc::clone(builder).downcast_arc::<Builder<T>>().ok()
    }

    /// Returns the builder for `T` if it is currently exposed as `name`.
    pub fn builder_named<T: Subject>(&self, name: &str) -> Result<Arc<Builder<T>>, BuildError> {
        let builder = self.builder::<T>();
        if builder.exposed_name() == name {
            Ok(builder)
        } else {
            Err(BuildError::UnexposedName {
                subject: type_name::<T>(),
                name: name.to_owned(),
            })
        }
    }

    /// Standard construction entry point for `T`.
    ///
    /// Routes through the builder if it has been overridden with
    /// [`Builder::override_new`]; otherwise constructs an unbound instance
    /// with [`Subject::construct`]. Never creates a builder.
    pub fn create<T: Subject>(&self, args: T::Args) -> Instance<T> {
        match self.get::<T>() {
            Some(builder) if builder.is_overridden() => builder.new(args),
            _ => Instance::bare(T::construct(args)),
        }
    }

    /// Describes the builder whose subject is called `subject`.
    ///
    /// Accepts the full type name or its last path segment. Fails with
    /// [`BuildError::InvalidSubject`] if no builder for such a type exists.
    pub fn describe(&self, subject: &str) -> Result<BuilderSummary, BuildError> {
        let builders = self.inner.builders.read();
        builders
            .values()
            .map(|builder| builder.summary())
            .find(|summary| matches_subject(summary.subject, subject))
            .ok_or_else(|| BuildError::InvalidSubject {
                subject: subject.to_owned(),
            })
    }

    /// Summaries of every builder, sorted by subject name.
    pub fn summaries(&self) -> Vec<BuilderSummary> {
        let mut summaries: Vec<_> = self
            .inner
            .builders
            .read()
            .values()
            .map(|builder| builder.summary())
            .collect();
        summaries.sort_by(|a, b| a.subject.cmp(b.subject));
        summaries
    }

    /// Number of subject types with a builder.
    pub fn len(&self) -> usize {
        self.inner.builders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.builders.read().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subjects: Vec<&str> = self.summaries().iter().map(|s| s.subject).collect();
        f.debug_struct("Registry").field("subjects", &subjects).finish()
    }
}

fn matches_subject(full: &str, wanted: &str) -> bool {
    full == wanted
        || full
            .strip_suffix(wanted)
            .is_some_and(|prefix| prefix.ends_with("::"))
}
