//! mzl: declarative builders for arbitrary types.
//!
//! This crate attaches a secondary construction API to any type that
//! implements [`Subject`], without touching the type itself. A type's
//! [`Builder`] holds named operations; values built through it get the
//! persistent operations installed. Running a construction block installs
//! every operation on that value and lets the block call them through a
//! [`Scope`].
//!
//! # Quick Start
//!
//! ```rust
//! use mzl::{ChildOptions, CollectionOptions, OpOptions, Registry, Subject};
//!
//! #[derive(Default)]
//! struct Room {
//!     name: String,
//! }
//!
//! impl Subject for Room {
//!     type Args = ();
//!     fn construct(_: ()) -> Self {
//!         Room::default()
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Roof {
//!     material: String,
//! }
//!
//! impl Subject for Roof {
//!     type Args = ();
//!     fn construct(_: ()) -> Self {
//!         Roof { material: "tile".to_string() }
//!     }
//! }
//!
//! #[derive(Default)]
//! struct House;
//!
//! impl Subject for House {
//!     type Args = ();
//!     fn construct(_: ()) -> Self {
//!         House
//!     }
//! }
//!
//! let registry = Registry::new();
//! registry
//!     .builder::<Room>()
//!     .def("name", OpOptions::new(), |room, name: &'static str| {
//!         room.name = name.to_string();
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let house = registry.builder::<House>();
//! house.child::<Roof>("roof", ChildOptions::new()).unwrap();
//! house.array::<Room>("room", CollectionOptions::new()).unwrap();
//!
//! let mut built = house
//!     .new_with((), |h| {
//!         h.add::<Room, _>("room", None, |r| r.call("name", "kitchen"))?;
//!         h.add::<Room, _>("room", None, |r| r.call("name", "study"))?;
//!         h.child::<Roof>("roof")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let names: Vec<String> = built
//!     .collection::<Room>("rooms")
//!     .unwrap()
//!     .as_slice()
//!     .unwrap()
//!     .iter()
//!     .map(|room| room.name.clone())
//!     .collect();
//! assert_eq!(names, ["kitchen", "study"]);
//! assert_eq!(built.child::<Roof>("roof").unwrap().material, "tile");
//! ```
//!
//! # Modules
//!
//! - [`subject`]: The [`Subject`] trait a type implements to get a builder
//! - [`builder`]: Declaration and construction ([`Builder`])
//! - [`registry`]: One builder per type ([`Registry`])
//! - [`scope`]: The context construction blocks run in
//! - [`instance`]: Constructed values ([`Instance`])
//! - [`operation`]: Named operations and their options
//! - [`collection`]: Containers behind collection declarations
//! - [`attributes`]: Lazily initialized per-instance storage
//! - [`error`]: Error types
//!
//! # Threading
//!
//! Registries and builders are `Send + Sync`. Declarations, overrides and
//! renames may happen from any thread; no lock is held while user code runs.

pub mod attributes;
pub mod builder;
pub mod collection;
pub mod error;
pub mod instance;
pub mod operation;
pub mod registry;
pub mod scope;
pub mod subject;

// Re-export commonly used types at crate root
pub use attributes::Attributes;
pub use builder::{Builder, ChildOptions, CollectionOptions, Declaration, DeclarationKind};
pub use collection::{Collection, CollectionKind, Slot};
pub use error::{BuildError, ErrorCode};
pub use instance::Instance;
pub use operation::{Category, Definition, OpOptions, Operation, OperationRegistry};
pub use registry::{BuilderSummary, Registry};
pub use scope::Scope;
pub use subject::Subject;

/// Name a builder is exposed under until renamed.
pub const DEFAULT_EXPOSED_NAME: &str = "mzl";

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
