//! Child and collection declarations.
//!
//! These compose other types' builders into a parent builder. Each
//! declaration registers ordinary operations on the parent, so the usual
//! persistence and uniqueness rules apply to them.

use std::any::type_name;
use std::sync::{Arc, Weak};

use log::debug;

use crate::builder::Builder;
use crate::collection::{Collection, CollectionKind};
use crate::instance::Instance;
use crate::error::BuildError;
use crate::operation::{Category, Definition, OpOptions};
use crate::registry::{Registry, RegistryInner};
use crate::subject::Subject;

/// Options for [`Builder::child`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildOptions {
    /// Install the accessor on every instance. Defaults to true.
    pub persist: Option<bool>,
}

impl ChildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }
}

/// Options for [`Builder::collection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Install the plural accessor on every instance. Defaults to true.
    pub persist: Option<bool>,
    /// Name of the plural accessor. Defaults to the element name plus `s`.
    pub plural: Option<String>,
    /// Container kind. Defaults to [`CollectionKind::Sequence`].
    pub kind: CollectionKind,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    pub fn kind(mut self, kind: CollectionKind) -> Self {
        self.kind = kind;
        self
    }
}

/// What a [`Declaration`] declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Child,
    Collection { kind: CollectionKind, plural: String },
}

/// Record of a child or collection declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Accessor name (child) or add-operation name (collection).
    pub name: String,
    /// Element type name.
    pub element: &'static str,
    /// Whether the accessor is installed on every instance.
    pub persist: bool,
    pub kind: DeclarationKind,
}

/// Resolves the element builder through the registry at call time.
fn element_builder<C: Subject>(
    registry: &Weak<RegistryInner>,
) -> Result<Arc<Builder<C>>, BuildError> {
    Registry::upgrade(registry)
        .map(|registry| registry.builder::<C>())
        .ok_or(BuildError::Detached {
            subject: type_name::<C>(),
        })
}

impl<T: Subject> Builder<T> {
    /// Declares an accessor `name` that lazily builds a single `C`.
    ///
    /// On first call the accessor constructs `C` through its own builder and
    /// stores it on the instance; later calls return the stored child. Use
    /// [`Scope::child_with`](crate::Scope::child_with) to configure the child
    /// with a block. With `persist` (the default) the accessor is installed on
    /// every instance, otherwise only on instances a block has run against.
    pub fn child<C>(&self, name: impl Into<String>, options: ChildOptions) -> Result<(), BuildError>
    where
        C: Subject,
        C::Args: Default,
    {
        let name = name.into();
        let persist = OpOptions { persist: options.persist }
            .merged(&self.defaults(Category::Child))
            .persist
            .unwrap_or(true);

        let registry = self.registry.clone();
        let key = name.clone();
        let definition = Definition::<T>::new(name.clone()).persist(persist).behavior(
            move |scope, (): ()| {
                let builder = element_builder::<C>(&registry)?;
                scope.get_or_init(&key, || builder.new(C::Args::default()))?;
                Ok(())
            },
        );
        self.define_in(Category::Child, definition)?;

        debug!("{}: child `{}` of {}", self.subject_name(), name, type_name::<C>());
        self.declarations.write().push(Declaration {
            name,
            element: type_name::<C>(),
            persist,
            kind: DeclarationKind::Child,
        });
        Ok(())
    }

    /// Declares a collection of `C` values.
    ///
    /// Registers a plural accessor returning the lazily created container,
    /// and a call-scoped add operation `name` taking an optional key and an
    /// already built `Instance<C>`. The operation appends the element
    /// (sequences) or inserts it under the key (mappings). Use
    /// [`Scope::add`](crate::Scope::add) to build and configure the element
    /// first. Adding to a mapping without a non-empty key fails with
    /// [`BuildError::InvalidCollectionKey`] and leaves the container as it was.
    pub fn collection<C>(
        &self,
        name: impl Into<String>,
        options: CollectionOptions,
    ) -> Result<(), BuildError>
    where
        C: Subject,
        C::Args: Default,
    {
        let name = name.into();
        let plural = options.plural.unwrap_or_else(|| format!("{name}s"));
        let kind = options.kind;
        let persist = OpOptions { persist: options.persist }
            .merged(&self.defaults(Category::Collection))
            .persist
            .unwrap_or(true);

        // Both names must be free before anything is registered.
        for taken in [&name, &plural] {
            if self.has_operation(taken) {
                return Err(BuildError::DuplicateOperation {
                    subject: self.subject_name(),
                    name: taken.clone(),
                });
            }
        }

        let subject = self.subject_name();
        let (add_name, container) = (name.clone(), plural.clone());
        let add = Definition::<T>::new(name.clone()).persist(false).behavior(
            move |scope, (key, element): (Option<String>, Instance<C>)| {
                if kind == CollectionKind::Mapping && key.as_deref().is_none_or(str::is_empty) {
                    return Err(BuildError::InvalidCollectionKey {
                        subject,
                        collection: add_name.clone(),
                    });
                }
                let collection = scope.get_or_init(&container, || Collection::<C>::new(kind))?;
                collection
                    .insert(&container, key, element)
                    .ok_or_else(|| BuildError::InvalidCollectionKey {
                        subject,
                        collection: add_name.clone(),
                    })
            },
        );
        self.define_in(Category::Collection, add)?;

        let container = plural.clone();
        let accessor = Definition::<T>::new(plural.clone()).persist(persist).behavior(
            move |scope, (): ()| -> Result<(), BuildError> {
                scope.get_or_init(&container, || Collection::<C>::new(kind))?;
                Ok(())
            },
        );
        self.define_in(Category::Collection, accessor)?;

        debug!(
            "{}: {:?} collection `{}` of {} (accessor `{}`)",
            self.subject_name(),
            kind,
            name,
            type_name::<C>(),
            plural
        );
        self.declarations.write().push(Declaration {
            name,
            element: type_name::<C>(),
            persist,
            kind: DeclarationKind::Collection { kind, plural },
        });
        Ok(())
    }

    /// [`Builder::collection`] with a sequence container.
    pub fn array<C>(
        &self,
        name: impl Into<String>,
        options: CollectionOptions,
    ) -> Result<(), BuildError>
    where
        C: Subject,
        C::Args: Default,
    {
        self.collection::<C>(name, options.kind(CollectionKind::Sequence))
    }

    /// [`Builder::collection`] with a mapping container.
    pub fn hash<C>(
        &self,
        name: impl Into<String>,
        options: CollectionOptions,
    ) -> Result<(), BuildError>
    where
        C: Subject,
        C::Args: Default,
    {
        self.collection::<C>(name, options.kind(CollectionKind::Mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Wheel {
        size: u8,
    }

    impl Subject for Wheel {
        type Args = ();
        fn construct(_: ()) -> Self {
            Wheel { size: 16 }
        }
    }

    #[derive(Debug, Default)]
    struct Engine {
        horsepower: u32,
    }

    impl Subject for Engine {
        type Args = ();
        fn construct(_: ()) -> Self {
            Engine::default()
        }
    }

    #[derive(Debug, Default)]
    struct Car {
        model: String,
    }

    impl Subject for Car {
        type Args = ();
        fn construct(_: ()) -> Self {
            Car::default()
        }
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        let engine = registry.builder::<Engine>();
        engine
            .def("horsepower", OpOptions::new(), |s, hp: u32| {
                s.horsepower = hp;
                Ok(())
            })
            .unwrap();
        let wheel = registry.builder::<Wheel>();
        wheel
            .def("size", OpOptions::new(), |s, size: u8| {
                s.size = size;
                Ok(())
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_child_lazily_built_and_configured() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.child::<Engine>("engine", ChildOptions::new()).unwrap();

        let mut built = car
            .new_with((), |s| {
                s.model = "roadster".to_string();
                s.child_with::<Engine, _>("engine", |e| e.call("horsepower", 300u32))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(built.model, "roadster");
        // Persistent by default: reachable without a block, and the same child.
        let engine = built.child::<Engine>("engine").unwrap();
        assert_eq!(engine.horsepower, 300);
        // The child is a fully built Engine, bound to its own builder.
        assert!(engine.responds_to("mzl"));
    }

    #[test]
    fn test_child_reconfigure_keeps_instance() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.child::<Engine>("engine", ChildOptions::new()).unwrap();

        let mut built = car.new(());
        built
            .child_with::<Engine, _>("engine", |e| e.call("horsepower", 100u32))
            .unwrap();
        built
            .child_with::<Engine, _>("engine", |e| {
                e.horsepower += 50;
                Ok(())
            })
            .unwrap();

        assert_eq!(built.child::<Engine>("engine").unwrap().horsepower, 150);
    }

    #[test]
    fn test_call_scoped_child() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.child::<Engine>("engine", ChildOptions::new().persist(false))
            .unwrap();

        let mut plain = car.new(());
        assert!(!plain.responds_to("engine"));
        assert!(matches!(
            plain.child::<Engine>("engine"),
            Err(BuildError::UnknownOperation { .. })
        ));

        let mut built = car
            .new_with((), |s| {
                s.child_with::<Engine, _>("engine", |e| e.call("horsepower", 90u32))?;
                Ok(())
            })
            .unwrap();
        // Running a block installed the accessor on this instance only.
        assert!(built.responds_to("engine"));
        assert_eq!(built.child::<Engine>("engine").unwrap().horsepower, 90);
        assert!(!plain.responds_to("engine"));
    }

    #[test]
    fn test_sequence_collection_order() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.array::<Wheel>("wheel", CollectionOptions::new()).unwrap();

        let mut built = car
            .new_with((), |s| {
                for size in [17u8, 18, 19] {
                    s.add::<Wheel, _>("wheel", None, |w| w.call("size", size))?;
                }
                Ok(())
            })
            .unwrap();

        let wheels = built.collection::<Wheel>("wheels").unwrap();
        let sizes: Vec<u8> = wheels.as_slice().unwrap().iter().map(|w| w.size).collect();
        assert_eq!(sizes, vec![17, 18, 19]);
        assert!(built.responds_to("wheels"));
        // The add operation is call-scoped, but the block installed it here.
        assert!(built.responds_to("wheel"));
        assert!(!car.new(()).responds_to("wheel"));
        built.add::<Wheel, _>("wheel", None, |w| w.call("size", 20u8)).unwrap();
        assert_eq!(built.collection::<Wheel>("wheels").unwrap().len(), 4);
    }

    #[test]
    fn test_mapping_collection_by_key() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.hash::<Wheel>("spare", CollectionOptions::new()).unwrap();

        let mut built = car
            .new_with((), |s| {
                s.add::<Wheel, _>("spare", Some("x"), |w| w.call("size", 15u8))?;
                Ok(())
            })
            .unwrap();

        let spares = built.collection::<Wheel>("spares").unwrap();
        assert_eq!(spares.kind(), CollectionKind::Mapping);
        assert_eq!(spares.get("x").map(|w| w.size), Some(15));
    }

    #[test]
    fn test_failed_add_leaves_container_unchanged() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.hash::<Wheel>("spare", CollectionOptions::new()).unwrap();
        car.array::<Wheel>("wheel", CollectionOptions::new()).unwrap();

        let mut built = car
            .new_with((), |s| {
                s.add::<Wheel, _>("spare", Some("x"), |w| w.call("size", 15u8))?;
                s.add::<Wheel, _>("wheel", None, |w| w.call("size", 17u8))?;
                Ok(())
            })
            .unwrap();

        let result = built.configure(|s| {
            s.add::<Wheel, _>("spare", Some("x"), |w| {
                w.size = 1;
                Err(BuildError::Unbound { subject: "flat" })
            })?;
            Ok(())
        });
        assert!(matches!(result, Err(BuildError::Unbound { .. })));

        let result = built.configure(|s| {
            s.add::<Wheel, _>("wheel", None, |w| w.call::<(), ()>("inflate", ()))?;
            Ok(())
        });
        assert!(matches!(result, Err(BuildError::UnknownOperation { .. })));

        let spares = built.collection::<Wheel>("spares").unwrap();
        assert_eq!(spares.get("x").map(|w| w.size), Some(15));
        let wheels = built.collection::<Wheel>("wheels").unwrap();
        assert_eq!(wheels.len(), 1);
        assert_eq!(wheels.get_index(0).map(|w| w.size), Some(17));
    }

    #[test]
    fn test_rejected_key_leaves_container_unchanged() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.hash::<Wheel>("spare", CollectionOptions::new()).unwrap();

        let mut built = car.new(());
        let result = built.configure(|s| {
            s.add::<Wheel, _>("spare", None, |_| Ok(()))?;
            Ok(())
        });
        assert!(matches!(result, Err(BuildError::InvalidCollectionKey { .. })));
        assert!(built.collection::<Wheel>("spares").unwrap().is_empty());
    }

    #[test]
    fn test_mapping_collection_requires_key() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.hash::<Wheel>("spare", CollectionOptions::new()).unwrap();

        for key in [None, Some("")] {
            let result = car.new_with((), |s| {
                s.add::<Wheel, _>("spare", key, |_| Ok(()))?;
                Ok(())
            });
            assert!(matches!(result, Err(BuildError::InvalidCollectionKey { .. })));
        }
    }

    #[test]
    fn test_custom_plural_and_call_scoped_accessor() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.collection::<Wheel>(
            "tire",
            CollectionOptions::new().plural("rubber").persist(false),
        )
        .unwrap();

        let mut built = car
            .new_with((), |s| {
                s.add::<Wheel, _>("tire", None, |_| Ok(()))?;
                assert_eq!(s.collection::<Wheel>("rubber")?.len(), 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(built.collection::<Wheel>("rubber").unwrap().len(), 1);
        let mut plain = car.new(());
        assert!(!plain.responds_to("rubber"));
        assert!(plain.collection::<Wheel>("rubber").is_err());
        assert_eq!(
            car.declarations(),
            vec![Declaration {
                name: "tire".to_string(),
                element: type_name::<Wheel>(),
                persist: false,
                kind: DeclarationKind::Collection {
                    kind: CollectionKind::Sequence,
                    plural: "rubber".to_string(),
                },
            }]
        );
    }

    #[test]
    fn test_collection_name_clash() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.def("wheels", OpOptions::new(), |_s, (): ()| Ok(())).unwrap();

        let result = car.array::<Wheel>("wheel", CollectionOptions::new());
        assert!(matches!(
            result,
            Err(BuildError::DuplicateOperation { ref name, .. }) if name == "wheels"
        ));
        // Nothing was half-declared.
        assert!(!car.has_operation("wheel"));
        assert!(car.declarations().is_empty());
    }

    #[test]
    fn test_child_defaults_merge() {
        let registry = registry();
        let car = registry.builder::<Car>();
        car.set_defaults(Category::Child, OpOptions::new().persist(false));
        car.child::<Engine>("engine", ChildOptions::new()).unwrap();
        car.child::<Wheel>("steering", ChildOptions::new().persist(true))
            .unwrap();

        let built = car.new(());
        assert!(!built.responds_to("engine"));
        assert!(built.responds_to("steering"));
    }
}
