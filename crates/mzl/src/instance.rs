//! Constructed values.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::attributes::Attributes;
use crate::builder::Builder;
use crate::collection::Collection;
use crate::error::BuildError;
use crate::scope::{Scope, Visibility, element_at};
use crate::subject::Subject;

/// The builder an instance was constructed by, under the name it was
/// exposed as at that time.
struct Binding<T: Subject> {
    builder: Arc<Builder<T>>,
    name: String,
}

/// A value of `T` together with its builder augmentation.
///
/// Instances built by a [`Builder`] carry the persistent operations of that
/// builder and a binding back to it for re-entry. Instances from a plain
/// [`Registry::create`](crate::Registry::create) on a non-overridden type
/// are unbound: they hold the value and an empty attribute bag only.
///
/// `Instance<T>` dereferences to `T`.
pub struct Instance<T: Subject> {
    value: T,
    attributes: Attributes,
    installed: FxHashSet<String>,
    binding: Option<Binding<T>>,
}

impl<T: Subject> Instance<T> {
    /// Wraps a raw value with no operations and no binding.
    pub(crate) fn bare(value: T) -> Self {
        Self {
            value,
            attributes: Attributes::new(),
            installed: FxHashSet::default(),
            binding: None,
        }
    }

    pub(crate) fn bind(&mut self, builder: Arc<Builder<T>>, name: String) {
        self.binding = Some(Binding { builder, name });
    }

    /// Marks `name` as callable outside a block. Returns true if newly installed.
    pub(crate) fn install(&mut self, name: &str) -> bool {
        self.installed.insert(name.to_owned())
    }

    // =========================================================================
    // Value access
    // =========================================================================

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Drops the augmentation and returns the raw value.
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Returns the attribute under `key`, initializing it first if unset.
    pub fn get_or_init<V, F>(&mut self, key: &str, init: F) -> Result<&mut V, BuildError>
    where
        V: std::any::Any + Send + Sync,
        F: FnOnce() -> V,
    {
        self.attributes.get_or_init(key, init)
    }

    /// Shorthand for `attributes().get(key)`.
    pub fn attribute<V: std::any::Any>(&self, key: &str) -> Option<&V> {
        self.attributes.get(key)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Returns true if `name` is an installed operation or the exposed name
    /// of this instance's builder.
    pub fn responds_to(&self, name: &str) -> bool {
        self.installed.contains(name)
            || self.binding.as_ref().is_some_and(|binding| binding.name == name)
    }

    /// Returns true if the operation `name` is installed on this instance.
    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Installed operation names, in no particular order.
    pub fn installed(&self) -> impl Iterator<Item = &str> {
        self.installed.iter().map(String::as_str)
    }

    /// Calls an installed operation.
    ///
    /// Only operations installed on this instance are visible here. Running
    /// a block with [`Instance::configure`] installs the rest.
    pub fn call<A: 'static, R: 'static>(&mut self, name: &str, args: A) -> Result<R, BuildError> {
        let builder = self.bound_builder()?;
        let mut scope = Scope::new(self, &builder, Visibility::Installed);
        scope.call(name, args)
    }

    /// Calls the child accessor `name` and returns the child.
    pub fn child<C: Subject>(&mut self, name: &str) -> Result<&mut Instance<C>, BuildError> {
        self.call::<(), ()>(name, ())?;
        self.attributes.require_mut::<Instance<C>>(name)
    }

    /// Calls the child accessor `name`, then configures the child with `block`.
    pub fn child_with<C, F>(&mut self, name: &str, block: F) -> Result<&mut Instance<C>, BuildError>
    where
        C: Subject,
        F: FnOnce(&mut Scope<'_, C>) -> Result<(), BuildError>,
    {
        let child = self.child::<C>(name)?;
        child.configure(block)?;
        Ok(child)
    }

    /// Builds a `C`, configures it with `block` and adds it to a collection
    /// through the installed add operation `name`.
    pub fn add<C, F>(
        &mut self,
        name: &str,
        key: Option<&str>,
        block: F,
    ) -> Result<&mut Instance<C>, BuildError>
    where
        C: Subject,
        C::Args: Default,
        F: FnOnce(&mut Scope<'_, C>) -> Result<(), BuildError>,
    {
        let builder = self.bound_builder()?;
        let slot = Scope::new(self, &builder, Visibility::Installed)
            .add_slot::<C, F>(name, key, block)?;
        element_at(&mut self.attributes, &slot)
    }

    /// Calls the collection accessor `plural` and returns the container.
    pub fn collection<C: Subject>(
        &mut self,
        plural: &str,
    ) -> Result<&mut Collection<C>, BuildError> {
        self.call::<(), ()>(plural, ())?;
        self.attributes.require_mut::<Collection<C>>(plural)
    }

    // =========================================================================
    // Re-entry
    // =========================================================================

    /// Returns the builder this instance was constructed by, if any.
    pub fn builder(&self) -> Option<Arc<Builder<T>>> {
        self.binding.as_ref().map(|binding| Arc::clone(&binding.builder))
    }

    /// Returns the name the builder is reachable under from this instance.
    pub fn exposed_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|binding| binding.name.as_str())
    }

    /// Runs `block` against this instance with every operation of its
    /// builder visible.
    pub fn configure<F>(&mut self, block: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Scope<'_, T>) -> Result<(), BuildError>,
    {
        let builder = self.bound_builder()?;
        builder.run(self, block)
    }

    /// Resolves the builder through its exposed `name`.
    pub fn reenter(&self, name: &str) -> Result<Arc<Builder<T>>, BuildError> {
        match &self.binding {
            Some(binding) if binding.name == name => Ok(Arc::clone(&binding.builder)),
            Some(_) => Err(BuildError::UnknownOperation {
                subject: std::any::type_name::<T>(),
                name: name.to_owned(),
            }),
            None => Err(BuildError::Unbound {
                subject: std::any::type_name::<T>(),
            }),
        }
    }

    /// Resolves the builder through `name` and reconfigures this instance with `block`.
    pub fn reenter_with<F>(&mut self, name: &str, block: F) -> Result<Arc<Builder<T>>, BuildError>
    where
        F: FnOnce(&mut Scope<'_, T>) -> Result<(), BuildError>,
    {
        let builder = self.reenter(name)?;
        builder.run(self, block)?;
        Ok(builder)
    }

    fn bound_builder(&self) -> Result<Arc<Builder<T>>, BuildError> {
        self.builder().ok_or_else(|| BuildError::Unbound {
            subject: std::any::type_name::<T>(),
        })
    }
}

impl<T: Subject> Deref for Instance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Subject> DerefMut for Instance<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Subject + fmt::Debug> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut installed: Vec<&str> = self.installed().collect();
        installed.sort_unstable();
        f.debug_struct("Instance")
            .field("value", &self.value)
            .field("attributes", &self.attributes)
            .field("installed", &installed)
            .field("exposed_name", &self.exposed_name())
            .finish()
    }
}
