//! Named operations and their options.
//!
//! An [`Operation`] is a named behavior a builder exposes on the values it
//! constructs. Behaviors are closures over a [`Scope`] and a typed argument;
//! they are stored type-erased and checked against the caller's types at
//! dispatch time.

pub mod registry;

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::BuildError;
use crate::scope::Scope;
use crate::subject::Subject;

pub use registry::OperationRegistry;

/// The declaration helper an options record applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Plain operations declared with `define`/`def`.
    Def,
    /// Child accessors declared with `child`.
    Child,
    /// Collection accessors declared with `collection`, `array` or `hash`.
    Collection,
}

/// Options attached to an operation.
///
/// Unset fields fall back to the builder's defaults for the category the
/// operation is declared under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpOptions {
    /// Install the operation on every constructed instance (`true`) or only
    /// expose it inside construction blocks (`false`).
    pub persist: Option<bool>,
}

impl OpOptions {
    /// Creates options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the persistence flag.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Fills unset fields from `defaults`.
    pub fn merged(self, defaults: &OpOptions) -> OpOptions {
        OpOptions {
            persist: self.persist.or(defaults.persist),
        }
    }

    /// Returns true if the operation is persistent. Unset means call-scoped.
    pub fn is_persistent(&self) -> bool {
        self.persist.unwrap_or(false)
    }
}

type BehaviorFn<T, A, R> = dyn Fn(&mut Scope<'_, T>, A) -> Result<R, BuildError> + Send + Sync;

/// Typed behavior, stored behind `dyn Any` in [`Operation`].
struct Behavior<T: Subject, A, R>(Box<BehaviorFn<T, A, R>>);

/// A type-erased behavior together with its printable signature.
pub(crate) struct ErasedBehavior {
    behavior: Arc<dyn Any + Send + Sync>,
    signature: &'static str,
}

impl ErasedBehavior {
    fn new<T, A, R, F>(f: F) -> Self
    where
        T: Subject,
        A: 'static,
        R: 'static,
        F: Fn(&mut Scope<'_, T>, A) -> Result<R, BuildError> + Send + Sync + 'static,
    {
        Self {
            behavior: Arc::new(Behavior::<T, A, R>(Box::new(f))),
            signature: type_name::<fn(A) -> R>(),
        }
    }
}

/// A named operation registered on a builder.
pub struct Operation<T: Subject> {
    name: String,
    options: OpOptions,
    behavior: ErasedBehavior,
    _subject: PhantomData<fn() -> T>,
}

impl<T: Subject> Operation<T> {
    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the options after merging with the builder's defaults.
    pub fn options(&self) -> OpOptions {
        self.options
    }

    /// Returns true if the operation is installed on every constructed instance.
    pub fn is_persistent(&self) -> bool {
        self.options.is_persistent()
    }

    /// Returns the call signature, e.g. `fn(u32) -> ()`.
    pub fn signature(&self) -> &'static str {
        self.behavior.signature
    }

    /// Runs the behavior against `scope`.
    ///
    /// Fails with [`BuildError::SignatureMismatch`] if `A` and `R` are not
    /// the types the behavior was defined with.
    pub(crate) fn invoke<A: 'static, R: 'static>(
        &self,
        scope: &mut Scope<'_, T>,
        args: A,
    ) -> Result<R, BuildError> {
        let behavior = self
            .behavior
            .behavior
            .downcast_ref::<Behavior<T, A, R>>()
            .ok_or_else(|| BuildError::SignatureMismatch {
                name: self.name.clone(),
                expected: self.behavior.signature,
                found: type_name::<fn(A) -> R>(),
            })?;
        (behavior.0)(scope, args)
    }
}

impl<T: Subject> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("signature", &self.behavior.signature)
            .finish()
    }
}

/// Declaration of an operation, handed to [`Builder::define`](crate::Builder::define).
///
/// # Example
///
/// ```rust
/// use mzl::{Definition, Registry, Subject};
///
/// #[derive(Default)]
/// struct Counter {
///     count: u32,
/// }
///
/// impl Subject for Counter {
///     type Args = ();
///     fn construct(_: ()) -> Self {
///         Self::default()
///     }
/// }
///
/// let registry = Registry::new();
/// let builder = registry.builder::<Counter>();
/// builder
///     .define(Definition::new("bump").behavior(|scope: &mut mzl::Scope<'_, Counter>, by: u32| {
///         scope.count += by;
///         Ok(())
///     }))
///     .unwrap();
///
/// let counter = builder.new_with((), |scope| scope.call("bump", 3u32)).unwrap();
/// assert_eq!(counter.count, 3);
/// ```
pub struct Definition<T: Subject> {
    name: String,
    options: OpOptions,
    behavior: Option<ErasedBehavior>,
    _subject: PhantomData<fn() -> T>,
}

impl<T: Subject> Definition<T> {
    /// Starts a declaration for `name` with unset options and no behavior.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: OpOptions::default(),
            behavior: None,
            _subject: PhantomData,
        }
    }

    /// Replaces the options.
    pub fn options(mut self, options: OpOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the persistence flag.
    pub fn persist(mut self, persist: bool) -> Self {
        self.options.persist = Some(persist);
        self
    }

    /// Sets the behavior run when the operation is called.
    pub fn behavior<A, R, F>(mut self, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&mut Scope<'_, T>, A) -> Result<R, BuildError> + Send + Sync + 'static,
    {
        self.behavior = Some(ErasedBehavior::new(f));
        self
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if a behavior has been set.
    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    /// Validates the declaration and produces the operation.
    pub(crate) fn into_operation(
        self,
        subject: &'static str,
        defaults: &OpOptions,
    ) -> Result<Operation<T>, BuildError> {
        let behavior = self.behavior.ok_or_else(|| BuildError::MissingBehavior {
            subject,
            name: self.name.clone(),
        })?;
        Ok(Operation {
            name: self.name,
            options: self.options.merged(defaults),
            behavior,
            _subject: PhantomData,
        })
    }
}

impl<T: Subject> fmt::Debug for Definition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}
