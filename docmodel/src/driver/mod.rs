pub mod memory;
pub mod sqlite;

pub use memory::{MemoryDriver, MemoryStore};
pub use sqlite::{SqliteDriver, SqliteStore};

use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use crate::model::{document_id, Attributes, ModelClass, ID_KEY};
use crate::schema::Schema;
use indexmap::IndexMap;
use serde_json::Value;
use std::rc::{Rc, Weak};

/// Storage operations a model class delegates to.
///
/// Implementations must hand back plain attribute maps; materializing them
/// into models is the factory's job.
pub trait DocumentStore {
    /// Every document of `table`, in storage order.
    fn find_all(&self, table: &str) -> Result<Vec<Attributes>>;

    /// Documents of `table` whose `key` attribute equals `value`.
    ///
    /// A string looked up under `_id` matches by [`document_id`], so numeric
    /// ids are found through the id `save` returned for them.
    fn find_by(&self, table: &str, key: &str, value: &Value) -> Result<Vec<Attributes>> {
        Ok(self
            .find_all(table)?
            .into_iter()
            .filter(|doc| matches_attribute(doc, key, value))
            .collect())
    }

    /// Insert or replace the document stored under `id`.
    fn save(&self, table: &str, id: &str, document: &Attributes) -> Result<()>;

    /// Delete the document stored under `id`. Returns whether it existed.
    fn remove(&self, table: &str, id: &str) -> Result<bool>;
}

/// Attribute equality as used by [`DocumentStore::find_by`].
pub fn matches_attribute(document: &Attributes, key: &str, value: &Value) -> bool {
    match (key, value) {
        (ID_KEY, Value::String(id)) => document_id(document).as_deref() == Some(id.as_str()),
        _ => document.get(key) == Some(value),
    }
}

/// Connection lifecycle and model class selection for one storage backend.
///
/// The default method bodies are the abstract base: they fail with
/// [`DocModelError::UnimplementedDriverMethod`].
pub trait Driver {
    /// Connection string.
    fn url(&self) -> &str;

    fn is_connected(&self) -> bool {
        false
    }

    fn connect(&mut self) -> Result<()> {
        Err(DocModelError::unimplemented("Driver.connect()"))
    }

    fn disconnect(&mut self) -> Result<()> {
        Err(DocModelError::unimplemented("Driver.disconnect()"))
    }

    /// The model class to bind to a new factory.
    fn model_class(&self, _factory: Weak<ModelFactory>) -> Result<ModelClass> {
        Err(DocModelError::unimplemented("Driver.getModelClass()"))
    }
}

/// A driver that overrides nothing.
#[derive(Debug, Clone)]
pub struct BaseDriver {
    url: String,
}

impl BaseDriver {
    pub fn new(url: impl Into<String>) -> Self {
        BaseDriver { url: url.into() }
    }
}

impl Driver for BaseDriver {
    fn url(&self) -> &str {
        &self.url
    }
}

/// Connection notifications emitted by a [`Database`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Connected { url: String },
    Disconnected { url: String },
    Error { url: String, message: String },
}

type EventListener = Box<dyn Fn(&DriverEvent)>;

/// Registry of model factories over one driver.
pub struct Database<D: Driver> {
    driver: D,
    models: IndexMap<String, Rc<ModelFactory>>,
    listeners: Vec<EventListener>,
}

impl<D: Driver> Database<D> {
    pub fn new(driver: D) -> Self {
        Database {
            driver,
            models: IndexMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn url(&self) -> &str {
        self.driver.url()
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// Register a listener for connection events.
    pub fn on_event(&mut self, listener: impl Fn(&DriverEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&self, event: DriverEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Connect the driver. Connecting an already connected driver is a no-op.
    pub fn connect(&mut self) -> Result<()> {
        if self.driver.is_connected() {
            return Ok(());
        }
        let url = self.driver.url().to_string();
        match self.driver.connect() {
            Ok(()) => {
                log::debug!("Connected to {url}");
                self.emit(DriverEvent::Connected { url });
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to connect to {url}: {e}");
                self.emit(DriverEvent::Error {
                    url,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Disconnect the driver. Disconnecting while not connected is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.driver.is_connected() {
            return Ok(());
        }
        self.driver.disconnect()?;
        let url = self.driver.url().to_string();
        log::debug!("Disconnected from {url}");
        self.emit(DriverEvent::Disconnected { url });
        Ok(())
    }

    /// Create and register a factory named `name`, bound to the driver's model
    /// class, then run `configure` against it and its schema.
    ///
    /// `configure` edits a staged copy of the schema that is installed once it
    /// returns `Ok`. The factory stays fully usable inside the closure, but it
    /// sees the schema as it was before `configure` ran, and schema edits made
    /// through `factory.schema_mut()` there are replaced by the staged copy.
    ///
    /// Registering an existing name replaces the previous factory.
    pub fn model<F>(&mut self, name: &str, configure: F) -> Result<Rc<ModelFactory>>
    where
        F: FnOnce(&ModelFactory, &mut Schema) -> Result<()>,
    {
        let factory = ModelFactory::with_class(name, |me| self.driver.model_class(me))?;
        let mut staged = factory.schema().clone();
        configure(&factory, &mut staged)?;
        *factory.schema_mut() = staged;

        if self.models.contains_key(name) {
            log::warn!("Model '{name}' is already registered; replacing it");
        }
        self.models.insert(name.to_string(), Rc::clone(&factory));
        log::debug!("Registered model '{}' ({})", name, factory.model().name());
        Ok(factory)
    }

    /// Register a factory with an empty schema.
    pub fn define(&mut self, name: &str) -> Result<Rc<ModelFactory>> {
        self.model(name, |_, _| Ok(()))
    }

    /// Look up a registered factory.
    pub fn factory(&self, name: &str) -> Result<Rc<ModelFactory>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DocModelError::UnknownModel(name.to_string()))
    }

    /// Registered factories by name, in registration order.
    pub fn models(&self) -> &IndexMap<String, Rc<ModelFactory>> {
        &self.models
    }

    pub fn to_vec(&self) -> Vec<Rc<ModelFactory>> {
        self.models.values().cloned().collect()
    }
}
