//! The context a configuration block runs in.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::builder::Builder;
use crate::collection::{Collection, Slot};
use crate::error::BuildError;
use crate::instance::Instance;
use crate::operation::Operation;
use crate::subject::Subject;

/// Which operations a [`Scope`] can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    /// Every registered operation (inside a block).
    All,
    /// Only the operations installed on the instance.
    Installed,
}

/// An instance under configuration, with its builder's operations callable.
///
/// Blocks passed to [`Builder::new_with`], [`Builder::run`] and
/// [`Instance::configure`] receive a `Scope`. It dereferences to the value
/// being built, so blocks can read and write its fields directly, and
/// dispatches operations by name with [`Scope::call`].
pub struct Scope<'a, T: Subject> {
    instance: &'a mut Instance<T>,
    builder: &'a Builder<T>,
    visibility: Visibility,
}

impl<'a, T: Subject> Scope<'a, T> {
    pub(crate) fn new(
        instance: &'a mut Instance<T>,
        builder: &'a Builder<T>,
        visibility: Visibility,
    ) -> Self {
        Self {
            instance,
            builder,
            visibility,
        }
    }

    pub fn value(&self) -> &T {
        self.instance.value()
    }

    pub fn value_mut(&mut self) -> &mut T {
        self.instance.value_mut()
    }

    /// The instance being configured.
    pub fn instance(&self) -> &Instance<T> {
        self.instance
    }

    pub fn instance_mut(&mut self) -> &mut Instance<T> {
        self.instance
    }

    /// The builder whose operations this scope dispatches to.
    pub fn builder(&self) -> &Builder<T> {
        self.builder
    }

    pub fn attributes(&self) -> &Attributes {
        self.instance.attributes()
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        self.instance.attributes_mut()
    }

    /// Returns the attribute under `key`, initializing it first if unset.
    pub fn get_or_init<V, F>(&mut self, key: &str, init: F) -> Result<&mut V, BuildError>
    where
        V: std::any::Any + Send + Sync,
        F: FnOnce() -> V,
    {
        self.instance.get_or_init(key, init)
    }

    /// Returns true if `name` can be called from this scope.
    pub fn responds_to(&self, name: &str) -> bool {
        match self.visibility {
            Visibility::All => self.builder.has_operation(name),
            Visibility::Installed => self.instance.is_installed(name),
        }
    }

    /// Calls the operation `name` with `args`.
    ///
    /// `A` and `R` must match the types the operation was defined with.
    pub fn call<A: 'static, R: 'static>(&mut self, name: &str, args: A) -> Result<R, BuildError> {
        let operation = self.resolve(name)?;
        log::trace!("{}: calling `{}`", std::any::type_name::<T>(), name);
        operation.invoke(self, args)
    }

    /// Calls the child accessor `name` and returns the child.
    pub fn child<C: Subject>(&mut self, name: &str) -> Result<&mut Instance<C>, BuildError> {
        self.call::<(), ()>(name, ())?;
        self.instance
            .attributes_mut()
            .require_mut::<Instance<C>>(name)
    }

    /// Calls the child accessor `name`, then configures the child with `block`
    /// through the child's own builder.
    pub fn child_with<C, F>(&mut self, name: &str, block: F) -> Result<&mut Instance<C>, BuildError>
    where
        C: Subject,
        F: FnOnce(&mut Scope<'_, C>) -> Result<(), BuildError>,
    {
        let child = self.child::<C>(name)?;
        child.configure(block)?;
        Ok(child)
    }

    /// Builds a `C` through its own builder, configures it with `block` and
    /// hands it to the collection add operation `name`.
    ///
    /// `key` is required for mapping collections and ignored for sequences.
    /// The container is only touched once the block has succeeded and the
    /// key has been accepted.
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
        let slot = self.add_slot::<C, F>(name, key, block)?;
        element_at(self.instance.attributes_mut(), &slot)
    }

    pub(crate) fn add_slot<C, F>(
        &mut self,
        name: &str,
        key: Option<&str>,
        block: F,
    ) -> Result<Slot, BuildError>
    where
        C: Subject,
        C::Args: Default,
        F: FnOnce(&mut Scope<'_, C>) -> Result<(), BuildError>,
    {
        self.resolve(name)?;
        let mut element = self.builder.registry()?.builder::<C>().new(C::Args::default());
        element.configure(block)?;
        self.call(name, (key.map(str::to_owned), element))
    }

    /// Calls the collection accessor `plural` and returns the container.
    pub fn collection<C: Subject>(
        &mut self,
        plural: &str,
    ) -> Result<&mut Collection<C>, BuildError> {
        self.call::<(), ()>(plural, ())?;
        self.instance
            .attributes_mut()
            .require_mut::<Collection<C>>(plural)
    }

    fn resolve(&self, name: &str) -> Result<Arc<Operation<T>>, BuildError> {
        let unknown = || BuildError::UnknownOperation {
            subject: std::any::type_name::<T>(),
            name: name.to_owned(),
        };
        if self.visibility == Visibility::Installed && !self.instance.is_installed(name) {
            return Err(unknown());
        }
        self.builder.operation(name).ok_or_else(unknown)
    }
}

/// Returns the element a collection add operation stored at `slot`.
pub(crate) fn element_at<'a, C: Subject>(
    attributes: &'a mut Attributes,
    slot: &Slot,
) -> Result<&'a mut Instance<C>, BuildError> {
    attributes
        .require_mut::<Collection<C>>(slot.collection())?
        .at_mut(slot)
        .ok_or_else(|| BuildError::AttributeType {
            key: slot.collection().to_owned(),
            expected: std::any::type_name::<Collection<C>>(),
        })
}

impl<T: Subject> Deref for Scope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.instance.value()
    }
}

impl<T: Subject> DerefMut for Scope<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.instance.value_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::operation::OpOptions;
    use crate::registry::Registry;

    #[derive(Debug, Default)]
    struct Widget {
        clicks: u32,
    }

    impl Subject for Widget {
        type Args = ();
        fn construct(_: ()) -> Self {
            Widget::default()
        }
    }

    fn widget_registry() -> Registry {
        let registry = Registry::new();
        let builder = registry.builder::<Widget>();
        builder
            .def("click", OpOptions::new(), |scope, (): ()| {
                scope.clicks += 1;
                Ok(scope.clicks)
            })
            .unwrap();
        builder
            .def(
                "properties",
                OpOptions::new().persist(true),
                |scope, (key, value): (&'static str, &'static str)| {
                    scope
                        .get_or_init("properties", BTreeMap::<String, String>::new)?
                        .insert(key.to_string(), value.to_string());
                    Ok(())
                },
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_block_sees_all_operations() {
        let registry = widget_registry();
        let widget = registry
            .builder::<Widget>()
            .new_with((), |scope| {
                assert!(scope.responds_to("click"));
                assert!(scope.responds_to("properties"));
                assert_eq!(scope.call::<(), u32>("click", ())?, 1);
                assert_eq!(scope.call::<(), u32>("click", ())?, 2);
                Ok(())
            })
            .unwrap();

        assert_eq!(widget.clicks, 2);
    }

    #[test]
    fn test_installed_visibility_outside_block() {
        let registry = widget_registry();
        let mut widget = registry.builder::<Widget>().new(());

        widget.call::<_, ()>("properties", ("color", "red")).unwrap();
        assert!(widget.responds_to("properties"));
        assert!(!widget.responds_to("click"));
        assert!(matches!(
            widget.call::<(), u32>("click", ()),
            Err(BuildError::UnknownOperation { .. })
        ));

        let props = widget.attribute::<BTreeMap<String, String>>("properties").unwrap();
        assert_eq!(props.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn test_signature_mismatch() {
        let registry = widget_registry();
        let result = registry.builder::<Widget>().new_with((), |scope| {
            scope.call::<u8, u32>("click", 1)?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(BuildError::SignatureMismatch { ref name, .. }) if name == "click"
        ));
    }

    #[test]
    fn test_unknown_operation_in_block() {
        let registry = widget_registry();
        let result = registry
            .builder::<Widget>()
            .new_with((), |scope| scope.call("missing", ()));

        assert!(matches!(result, Err(BuildError::UnknownOperation { .. })));
    }

    #[test]
    fn test_scope_exposes_instance() {
        let registry = widget_registry();
        registry
            .builder::<Widget>()
            .new_with((), |scope| {
                scope.value_mut().clicks = 7;
                assert_eq!(scope.value().clicks, 7);
                assert_eq!(scope.instance().clicks, 7);
                assert!(scope.builder().has_operation("click"));
                scope.attributes_mut().set("seen", true);
                assert_eq!(scope.attributes().get::<bool>("seen"), Some(&true));
                Ok(())
            })
            .unwrap();
    }
}
