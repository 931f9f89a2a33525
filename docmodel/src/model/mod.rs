// Model instances and the per-factory model class

use crate::collection::Collection;
use crate::driver::DocumentStore;
use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use crate::filter::Filterable;
use crate::schema::{CREATED_AT, MODIFIED_AT};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Attribute holding a stored document's identifier.
pub const ID_KEY: &str = "_id";

/// Attribute bag used to construct models.
pub type Attributes = Map<String, Value>;

/// The identifier of a document. Numeric ids are rendered as strings.
pub fn document_id(document: &Attributes) -> Option<String> {
    match document.get(ID_KEY) {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct ModelState {
    is_new: bool,
    modified: Vec<String>,
    attributes: Attributes,
}

/// A single record created by a [`ModelFactory`].
///
/// Every field the schema declared at construction time gets an accessor
/// (readable with [`Model::get`], writable with [`Model::set`]). Fields added
/// to the schema later only appear on models constructed afterwards.
///
/// Models are shared through `Rc`, so mutation goes through `&self`.
pub struct Model {
    factory: Rc<ModelFactory>,
    accessors: Vec<String>,
    state: RefCell<ModelState>,
}

impl Model {
    /// Construct a model from the factory's current schema.
    ///
    /// Declared fields are seeded with their default values, then the caller's
    /// attributes are merged over them. This initial fill is the record's
    /// original state: it does not mark the model modified or not-new.
    pub(crate) fn construct(factory: Rc<ModelFactory>, attributes: Attributes) -> Model {
        let (accessors, mut seeded) = {
            let schema = factory.schema();
            let mut accessors = Vec::with_capacity(schema.len());
            let mut seeded = Map::new();
            for field in schema.fields() {
                seeded.insert(field.name().to_string(), field.default_value.clone());
                accessors.push(field.name().to_string());
            }
            (accessors, seeded)
        };

        for (key, value) in attributes {
            seeded.insert(key, value);
        }

        Model {
            factory,
            accessors,
            state: RefCell::new(ModelState {
                is_new: true,
                modified: Vec::new(),
                attributes: seeded,
            }),
        }
    }

    pub fn factory(&self) -> &Rc<ModelFactory> {
        &self.factory
    }

    /// Name of the model this record belongs to.
    pub fn model_name(&self) -> &str {
        self.factory.name()
    }

    /// True until the first tracked write.
    pub fn is_new(&self) -> bool {
        self.state.borrow().is_new
    }

    pub fn is_modified(&self) -> bool {
        !self.state.borrow().modified.is_empty()
    }

    /// Names of the fields written since construction, in first-write order.
    pub fn modified_fields(&self) -> Vec<String> {
        self.state.borrow().modified.clone()
    }

    /// Whether `name` has an accessor on this instance.
    pub fn has_field(&self, name: &str) -> bool {
        self.accessors.iter().any(|a| a == name)
    }

    /// Names of this instance's accessors, in priority order.
    pub fn field_names(&self) -> &[String] {
        &self.accessors
    }

    /// Read a field. Returns `None` for names without an accessor and
    /// `Some(Value::Null)` for declared fields that hold no value.
    pub fn get(&self, name: &str) -> Option<Value> {
        if !self.has_field(name) {
            return None;
        }
        Some(
            self.state
                .borrow()
                .attributes
                .get(name)
                .cloned()
                .unwrap_or(Value::Null),
        )
    }

    /// Write a field through its accessor. Clears the new flag and records
    /// the field as modified (once, at its first write).
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.has_field(name) {
            return Err(self.unknown_field(name));
        }
        let mut state = self.state.borrow_mut();
        state.is_new = false;
        state.attributes.insert(name.to_string(), value.into());
        if !state.modified.iter().any(|m| m == name) {
            state.modified.push(name.to_string());
        }
        Ok(())
    }

    /// Write several fields through their accessors. Every name is checked
    /// before anything is written.
    pub fn fill(&self, attributes: Attributes) -> Result<()> {
        if let Some(name) = attributes.keys().find(|name| !self.has_field(name)) {
            return Err(self.unknown_field(name));
        }
        for (name, value) in attributes {
            self.set(&name, value)?;
        }
        Ok(())
    }

    /// A copy of the raw attribute map.
    pub fn attributes(&self) -> Attributes {
        self.state.borrow().attributes.clone()
    }

    /// The raw attributes as a JSON object. Used for both display and serialization.
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// The stored identifier, if the record has one.
    pub fn id(&self) -> Option<String> {
        document_id(&self.state.borrow().attributes)
    }

    /// Replace the attributes with the stored document and mark the record
    /// as persisted.
    pub(crate) fn mark_persisted(&self, document: Attributes) {
        let mut state = self.state.borrow_mut();
        state.attributes = document;
        state.is_new = false;
        state.modified.clear();
    }

    fn unknown_field(&self, name: &str) -> DocModelError {
        DocModelError::UnknownField {
            model: self.model_name().to_string(),
            field: name.to_string(),
        }
    }
}

impl Filterable for Model {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.state.borrow().attributes.get(name).cloned()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.state.borrow().attributes.serialize(serializer)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Model")
            .field("model", &self.factory.name())
            .field("is_new", &state.is_new)
            .field("modified", &state.modified)
            .field("attributes", &state.attributes)
            .finish()
    }
}

/// The model "constructor" bound to a factory.
///
/// A driver supplies the class through [`crate::driver::Driver::model_class`];
/// classes backed by a [`DocumentStore`] also expose the query methods.
pub struct ModelClass {
    name: String,
    factory: Weak<ModelFactory>,
    store: Option<Rc<dyn DocumentStore>>,
}

impl ModelClass {
    /// A class with no storage backend.
    pub fn new(name: impl Into<String>, factory: Weak<ModelFactory>) -> Self {
        ModelClass {
            name: name.into(),
            factory,
            store: None,
        }
    }

    /// A class whose query methods go through `store`.
    pub fn with_store(
        name: impl Into<String>,
        factory: Weak<ModelFactory>,
        store: Rc<dyn DocumentStore>,
    ) -> Self {
        ModelClass {
            name: name.into(),
            factory,
            store: Some(store),
        }
    }

    /// Class name, e.g. "Model" or "SqliteModel".
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn factory(&self) -> Result<Rc<ModelFactory>> {
        self.factory
            .upgrade()
            .ok_or_else(|| DocModelError::Other(format!("{} outlived its model factory", self.name)))
    }

    /// Construct a model without emitting a create notification.
    pub fn instantiate(&self, attributes: Attributes) -> Result<Rc<Model>> {
        Ok(Rc::new(Model::construct(self.factory()?, attributes)))
    }

    /// Whether `model` was constructed by this class's factory.
    pub fn is_instance(&self, model: &Model) -> bool {
        self.factory
            .upgrade()
            .map(|f| Rc::ptr_eq(&f, model.factory()))
            .unwrap_or(false)
    }

    fn store(&self, method: &str) -> Result<&Rc<dyn DocumentStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| DocModelError::unimplemented(&format!("{}.{}()", self.name, method)))
    }

    /// Load every stored document of this model into a collection.
    pub fn all(&self) -> Result<Collection> {
        let store = self.store("all")?;
        let factory = self.factory()?;
        let table = factory.table();
        let documents = store.find_all(&table)?;
        log::debug!("Loaded {} documents from '{}'", documents.len(), table);
        factory.create_many(documents)
    }

    /// Load the documents whose `key` attribute equals `value`.
    pub fn find_by(&self, key: &str, value: &Value) -> Result<Collection> {
        let store = self.store("find_by")?;
        let factory = self.factory()?;
        let documents = store.find_by(&factory.table(), key, value)?;
        factory.create_many(documents)
    }

    /// Load a single document by identifier.
    pub fn find(&self, id: &str) -> Result<Option<Rc<Model>>> {
        let found = self.find_by(ID_KEY, &Value::String(id.to_string()))?;
        Ok(found.first().cloned())
    }

    /// Store a model. Assigns an `_id` when missing and stamps the timestamp
    /// fields the schema declares. Returns the document id.
    pub fn save(&self, model: &Model) -> Result<String> {
        let store = self.store("save")?;
        if !self.is_instance(model) {
            return Err(DocModelError::NotAModelInstance(format!(
                "{} record cannot be saved by {}",
                model.model_name(),
                self.name
            )));
        }
        let factory = model.factory();

        // Stamped on a copy; the record only changes once the store accepts it.
        let mut document = model.attributes();
        let id = match document_id(&document) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                document.insert(ID_KEY.to_string(), Value::String(id.clone()));
                id
            }
        };

        let now = Value::String(chrono::Utc::now().to_rfc3339());
        if model.has_field(CREATED_AT) && document.get(CREATED_AT).map_or(true, Value::is_null) {
            document.insert(CREATED_AT.to_string(), now.clone());
        }
        if model.has_field(MODIFIED_AT) {
            document.insert(MODIFIED_AT.to_string(), now);
        }

        store.save(&factory.table(), &id, &document)?;
        model.mark_persisted(document);
        Ok(id)
    }

    /// Delete a stored model. Returns whether a document was removed.
    pub fn remove(&self, model: &Model) -> Result<bool> {
        let store = self.store("remove")?;
        match model.id() {
            Some(id) => store.remove(&model.factory().table(), &id),
            None => Ok(false),
        }
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
