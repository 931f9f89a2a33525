use crate::collection::Collection;
use crate::error::{DocModelError, Result};
use crate::model::{Attributes, Model, ModelClass};
use crate::schema::Schema;
use crate::util::{table_name, value_kind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::mpsc;

/// Mutable naming options of a factory. All derived from the model name at
/// construction and independent of each other afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryOptions {
    /// Table or collection name in the backing store.
    pub table: String,
    /// Slug used in URLs.
    pub slug: String,
    pub singular: String,
    pub plural: String,
}

impl FactoryOptions {
    fn derive(name: &str) -> Self {
        let table = table_name(name);
        FactoryOptions {
            slug: table.clone(),
            table,
            singular: name.to_string(),
            plural: name.to_string(),
        }
    }
}

/// Notification emitted by a [`ModelFactory`].
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// A record was created through [`ModelFactory::create`].
    Created(Rc<Model>),
}

type Listener = Rc<dyn Fn(&ModelEvent)>;

/// Registry entry for one model: its name, schema, model class and the
/// creation entry point.
pub struct ModelFactory {
    name: String,
    schema: RefCell<Schema>,
    options: RefCell<FactoryOptions>,
    class: Rc<ModelClass>,
    listeners: RefCell<Vec<Listener>>,
    subscribers: RefCell<Vec<mpsc::Sender<ModelEvent>>>,
}

impl ModelFactory {
    /// A factory bound to the plain model class (no storage backend).
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new_cyclic(|me| Self::build(name, ModelClass::new("Model", me.clone()), me))
    }

    /// A factory whose model class is produced by `make_class`, typically a
    /// driver's [`crate::driver::Driver::model_class`].
    pub fn with_class<F>(name: &str, make_class: F) -> Result<Rc<Self>>
    where
        F: FnOnce(Weak<ModelFactory>) -> Result<ModelClass>,
    {
        let mut failure = None;
        let factory = Rc::new_cyclic(|me| {
            let class = make_class(me.clone()).unwrap_or_else(|e| {
                failure = Some(e);
                ModelClass::new("Model", me.clone())
            });
            Self::build(name, class, me)
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(factory),
        }
    }

    fn build(name: &str, class: ModelClass, me: &Weak<ModelFactory>) -> Self {
        ModelFactory {
            name: name.to_string(),
            schema: RefCell::new(Schema::for_factory(me.clone())),
            options: RefCell::new(FactoryOptions::derive(name)),
            class: Rc::new(class),
            listeners: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live schema.
    ///
    /// # Panics
    ///
    /// Panics while a guard returned by [`ModelFactory::schema_mut`] is alive.
    pub fn schema(&self) -> Ref<'_, Schema> {
        self.schema.borrow()
    }

    /// Mutable access to the live schema. Changes are seen by every model
    /// constructed afterwards.
    ///
    /// # Panics
    ///
    /// Panics while any other guard over the schema is alive.
    pub fn schema_mut(&self) -> RefMut<'_, Schema> {
        self.schema.borrow_mut()
    }

    /// The model class bound to this factory.
    pub fn model(&self) -> Rc<ModelClass> {
        Rc::clone(&self.class)
    }

    pub fn options(&self) -> FactoryOptions {
        self.options.borrow().clone()
    }

    pub fn table(&self) -> String {
        self.options.borrow().table.clone()
    }

    pub fn slug(&self) -> String {
        self.options.borrow().slug.clone()
    }

    pub fn singular(&self) -> String {
        self.options.borrow().singular.clone()
    }

    pub fn plural(&self) -> String {
        self.options.borrow().plural.clone()
    }

    /// Shallow-merge naming options (`table`, `slug`, `singular`, `plural`).
    /// Unknown keys and non-string values are rejected and nothing is applied.
    pub fn configure(&self, options: Map<String, Value>) -> Result<&Self> {
        let mut staged = self.options();
        for (key, value) in options {
            let target = match key.as_str() {
                "table" => &mut staged.table,
                "slug" => &mut staged.slug,
                "singular" => &mut staged.singular,
                "plural" => &mut staged.plural,
                "name" => return Err(self.invalid_option("'name' cannot be changed")),
                other => return Err(self.invalid_option(format!("unknown option '{other}'"))),
            };
            match value {
                Value::String(s) => *target = s,
                other => {
                    return Err(self.invalid_option(format!(
                        "'{key}' expects a string, got {}",
                        value_kind(&other)
                    )))
                }
            }
        }
        *self.options.borrow_mut() = staged;
        Ok(self)
    }

    fn invalid_option(&self, reason: impl Into<String>) -> DocModelError {
        DocModelError::InvalidFactoryOption {
            model: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Construct one record and notify listeners.
    ///
    /// # Panics
    ///
    /// Panics while a guard returned by [`ModelFactory::schema_mut`] is alive.
    pub fn create(self: &Rc<Self>, attributes: Attributes) -> Rc<Model> {
        let model = Rc::new(Model::construct(Rc::clone(self), attributes));
        self.emit(ModelEvent::Created(Rc::clone(&model)));
        model
    }

    /// Construct one record per attribute map, gathered in a collection.
    pub fn create_many<I>(self: &Rc<Self>, documents: I) -> Result<Collection>
    where
        I: IntoIterator<Item = Attributes>,
    {
        let mut collection = Collection::new();
        for attributes in documents {
            collection.add(self.create(attributes))?;
        }
        Ok(collection)
    }

    /// Create from dynamic input: an object yields one record, an array yields
    /// a collection (nested arrays are flattened). Any other shape is rejected
    /// before anything is created.
    pub fn create_from(self: &Rc<Self>, input: Value) -> Result<Created> {
        check_shape(&input)?;
        match input {
            Value::Object(attributes) => Ok(Created::One(self.create(attributes))),
            Value::Array(items) => {
                let mut documents = Vec::new();
                flatten(items, &mut documents);
                self.create_many(documents).map(Created::Many)
            }
            other => Err(DocModelError::NotAModelInstance(value_kind(&other).to_string())),
        }
    }

    /// Register a listener for every event of this factory.
    pub fn on(&self, listener: impl Fn(&ModelEvent) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Register a listener for created records.
    pub fn on_create(&self, listener: impl Fn(&Rc<Model>) + 'static) {
        self.on(move |event| match event {
            ModelEvent::Created(model) => listener(model),
        });
    }

    /// Receive events through a channel. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::Receiver<ModelEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    fn emit(&self, event: ModelEvent) {
        // Snapshot so listeners may register further listeners.
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&event);
        }

        self.subscribers.borrow_mut().retain(|tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                log::debug!("Dropping closed subscriber of {}", self.name);
            }
            delivered
        });
    }
}

impl fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("name", &self.name)
            .field("options", &*self.options.borrow())
            .field(
                "fields",
                &self.schema.try_borrow().map(|schema| schema.field_names()).ok(),
            )
            .field("class", &self.class)
            .finish()
    }
}

fn check_shape(input: &Value) -> Result<()> {
    match input {
        Value::Object(_) => Ok(()),
        Value::Array(items) => items.iter().try_for_each(check_shape),
        other => Err(DocModelError::NotAModelInstance(value_kind(other).to_string())),
    }
}

fn flatten(items: Vec<Value>, out: &mut Vec<Attributes>) {
    for item in items {
        match item {
            Value::Object(attributes) => out.push(attributes),
            Value::Array(nested) => flatten(nested, out),
            _ => {}
        }
    }
}

/// Result of [`ModelFactory::create_from`].
#[derive(Debug)]
pub enum Created {
    One(Rc<Model>),
    Many(Collection),
}

impl Created {
    pub fn into_models(self) -> Vec<Rc<Model>> {
        match self {
            Created::One(model) => vec![model],
            Created::Many(collection) => collection.into_iter().collect(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Created::One(model) => model.to_json(),
            Created::Many(collection) => collection.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    fn test_factory() -> Rc<ModelFactory> {
        let factory = ModelFactory::new("Test");
        factory
            .schema_mut()
            .text("a", ())
            .and_then(|s| s.text("b", ()))
            .unwrap();
        factory
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_debug_while_schema_is_borrowed() {
        let factory = test_factory();
        let _guard = factory.schema_mut();
        assert!(format!("{factory:?}").contains("fields: None"));
    }

    #[test]
    fn test_derived_names() {
        let factory = ModelFactory::new("BlogPost");
        assert_eq!(factory.name(), "BlogPost");
        assert_eq!(factory.table(), "blogpost");
        assert_eq!(factory.slug(), "blogpost");
        assert_eq!(factory.singular(), "BlogPost");
        assert_eq!(factory.plural(), "BlogPost");
    }

    #[test]
    fn test_schema_points_back_to_factory() {
        let factory = test_factory();
        let owner = factory.schema().factory().unwrap();
        assert!(Rc::ptr_eq(&owner, &factory));
    }

    #[test]
    fn test_configure_options_independently() {
        let factory = ModelFactory::new("Post");
        factory
            .configure(map(json!({"table": "posts", "plural": "Posts"})))
            .unwrap();
        assert_eq!(factory.table(), "posts");
        assert_eq!(factory.slug(), "post");
        assert_eq!(factory.plural(), "Posts");
        assert_eq!(factory.singular(), "Post");
    }

    #[test]
    fn test_configure_rejects_bad_options_atomically() {
        let factory = ModelFactory::new("Post");
        let err = factory
            .configure(map(json!({"table": "posts", "colour": "red"})))
            .unwrap_err();
        assert!(matches!(err, DocModelError::InvalidFactoryOption { .. }));
        assert_eq!(factory.table(), "post");

        assert!(factory.configure(map(json!({"slug": 3}))).is_err());
        assert!(factory.configure(map(json!({"name": "Other"}))).is_err());
        assert_eq!(factory.name(), "Post");
    }

    #[test]
    fn test_create_notifies_listeners_and_subscribers() {
        let factory = test_factory();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        factory.on_create(move |model| {
            assert_eq!(model.model_name(), "Test");
            counter.set(counter.get() + 1);
        });
        let rx = factory.subscribe();

        let model = factory.create(map(json!({"a": "one"})));
        assert_eq!(seen.get(), 1);
        match rx.try_recv().unwrap() {
            ModelEvent::Created(received) => assert!(Rc::ptr_eq(&received, &model)),
        }
    }

    #[test]
    fn test_closed_subscriber_does_not_fail_create() {
        let factory = test_factory();
        drop(factory.subscribe());
        let model = factory.create(Attributes::new());
        assert_eq!(model.get("a"), Some(Value::Null));
        assert!(factory.subscribers.borrow().is_empty());
    }

    #[test]
    fn test_class_instantiate_does_not_notify() {
        let factory = test_factory();
        let rx = factory.subscribe();
        factory.model().instantiate(Attributes::new()).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_create_many_builds_bound_collection() {
        let factory = test_factory();
        let collection = factory
            .create_many(vec![
                map(json!({"a": "one", "b": "one"})),
                map(json!({"a": "two", "b": "two"})),
                map(json!({"a": "three", "b": "three"})),
            ])
            .unwrap();
        assert_eq!(collection.len(), 3);
        assert!(Rc::ptr_eq(collection.factory().unwrap(), &factory));
        assert!(Rc::ptr_eq(&collection.model().unwrap(), &factory.model()));
    }

    #[test]
    fn test_create_from_dispatches_on_shape() {
        let factory = test_factory();
        let rx = factory.subscribe();

        match factory.create_from(json!({"a": 1})).unwrap() {
            Created::One(model) => assert_eq!(model.get("a"), Some(json!(1))),
            Created::Many(_) => panic!("expected a single model"),
        }

        let many = factory.create_from(json!([{"a": 1}, [{"a": 2}, {"a": 3}]])).unwrap();
        assert_eq!(many.into_models().len(), 3);
        assert_eq!(rx.try_iter().count(), 4);

        let err = factory.create_from(json!([{"a": 1}, 2])).unwrap_err();
        assert!(matches!(err, DocModelError::NotAModelInstance(ref kind) if kind == "number"));
        assert!(factory.create_from(json!("text")).is_err());
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_with_class_propagates_failure() {
        let err = ModelFactory::with_class("Broken", |_| {
            Err(DocModelError::UnimplementedDriverMethod("getModelClass".into()))
        })
        .unwrap_err();
        assert!(matches!(err, DocModelError::UnimplementedDriverMethod(_)));

        let factory =
            ModelFactory::with_class("Custom", |me| Ok(ModelClass::new("CustomModel", me))).unwrap();
        assert_eq!(factory.model().name(), "CustomModel");
    }
}
