//! Schema-driven document models.
//!
//! A [`ModelFactory`] owns a mutable [`Schema`] of typed [`Field`]s and
//! produces [`Model`] records that track their own modifications. Models from
//! one factory can be grouped in a [`Collection`]. A [`Database`] registers
//! factories over a [`Driver`], which decides the model class and storage.

pub mod collection;
pub mod driver;
pub mod error;
pub mod factory;
pub mod filter;
pub mod model;
pub mod schema;
pub mod util;

pub use collection::{Collection, CollectionItem};
pub use driver::{
    BaseDriver, Database, DocumentStore, Driver, DriverEvent, MemoryDriver, SqliteDriver,
};
pub use error::{DocModelError, Result};
pub use factory::{Created, FactoryOptions, ModelEvent, ModelFactory};
pub use filter::{Filterable, Predicate};
pub use model::{Attributes, Model, ModelClass};
pub use schema::{
    parse_definitions, parse_definitions_str, Field, FieldOption, FieldType, ModelDefinitions,
    Schema,
};
