//! The contract a type meets to get a builder.

use std::any::Any;
use std::sync::Arc;

use crate::builder::Builder;
use crate::instance::Instance;
use crate::registry::Registry;

/// A type that can be constructed through a [`Builder`].
///
/// [`Subject::construct`] is the type's own construction path. Builders
/// never replace it: they call it first and augment the result, so any
/// field initialization it performs is preserved.
///
/// The `Send + Sync` bound comes from the shared [`Registry`]: builders and
/// instance attributes may be reached from several threads. Types holding
/// `Rc` or `RefCell` cannot be subjects; wrap such state in `Arc` and a
/// lock, or keep it outside the value.
///
/// # Example
///
/// ```rust
/// use mzl::Subject;
///
/// #[derive(Debug, Default)]
/// struct Engine {
///     cylinders: u8,
/// }
///
/// impl Subject for Engine {
///     type Args = u8;
///
///     fn construct(cylinders: u8) -> Self {
///         Self { cylinders }
///     }
/// }
///
/// let engine = Engine::builder().new(6);
/// assert_eq!(engine.cylinders, 6);
/// ```
pub trait Subject: Any + Send + Sync + Sized {
    /// Arguments forwarded to [`Subject::construct`].
    type Args;

    /// Builds a raw value without touching any builder.
    fn construct(args: Self::Args) -> Self;

    /// Returns this type's builder in the process-wide registry.
    fn builder() -> Arc<Builder<Self>> {
        Registry::global().builder::<Self>()
    }

    /// Standard construction entry point in the process-wide registry.
    ///
    /// Routes through the builder when it has been overridden with
    /// [`Builder::override_new`], otherwise returns an unbound instance.
    fn create(args: Self::Args) -> Instance<Self> {
        Registry::global().create::<Self>(args)
    }
}
