use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use crate::filter::Predicate;
use crate::model::{Model, ModelClass};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// What can be passed to [`Collection::add`]: one model or a (possibly
/// nested) sequence of them.
pub enum CollectionItem {
    One(Rc<Model>),
    Many(Vec<CollectionItem>),
}

impl From<Rc<Model>> for CollectionItem {
    fn from(model: Rc<Model>) -> Self {
        CollectionItem::One(model)
    }
}

impl From<&Rc<Model>> for CollectionItem {
    fn from(model: &Rc<Model>) -> Self {
        CollectionItem::One(Rc::clone(model))
    }
}

impl<T: Into<CollectionItem>> From<Vec<T>> for CollectionItem {
    fn from(items: Vec<T>) -> Self {
        CollectionItem::Many(items.into_iter().map(Into::into).collect())
    }
}

impl From<Collection> for CollectionItem {
    fn from(collection: Collection) -> Self {
        CollectionItem::Many(collection.items.into_iter().map(CollectionItem::One).collect())
    }
}

/// An ordered, duplicate-free group of models that all come from one factory.
///
/// The collection is unbound until the first model is added; that model's
/// factory is then fixed for the lifetime of the collection. Membership is
/// by instance identity.
#[derive(Clone, Default)]
pub struct Collection {
    items: Vec<Rc<Model>>,
    factory: Option<Rc<ModelFactory>>,
}

impl Collection {
    pub fn new() -> Self {
        Collection::default()
    }

    /// Build a collection from `items`, failing on the first rejected item.
    pub fn from_items(items: impl Into<CollectionItem>) -> Result<Self> {
        let mut collection = Collection::new();
        collection.add(items)?;
        Ok(collection)
    }

    /// Add a model or a sequence of models, in order.
    ///
    /// Adding a model that is already a member is a no-op. A model from a
    /// different factory than the bound one is rejected; items of a sequence
    /// added before the rejected one stay in the collection.
    pub fn add(&mut self, item: impl Into<CollectionItem>) -> Result<&mut Self> {
        match item.into() {
            CollectionItem::Many(items) => {
                for item in items {
                    self.add(item)?;
                }
            }
            CollectionItem::One(model) => self.add_model(model)?,
        }
        Ok(self)
    }

    fn add_model(&mut self, model: Rc<Model>) -> Result<()> {
        if let Some(bound) = &self.factory {
            if !Rc::ptr_eq(bound, model.factory()) {
                return Err(DocModelError::HeterogeneousCollection {
                    expected: bound.name().to_string(),
                    found: model.model_name().to_string(),
                });
            }
            if self.contains(&model) {
                return Ok(());
            }
        } else {
            // First accepted item binds the collection.
            self.factory = Some(Rc::clone(model.factory()));
        }
        self.items.push(model);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The bound factory, or `None` while the collection is unbound.
    pub fn factory(&self) -> Option<&Rc<ModelFactory>> {
        self.factory.as_ref()
    }

    /// The bound factory's model class.
    pub fn model(&self) -> Option<Rc<ModelClass>> {
        self.factory.as_ref().map(|f| f.model())
    }

    /// Whether this exact instance is a member.
    pub fn contains(&self, model: &Model) -> bool {
        self.items.iter().any(|m| std::ptr::eq(Rc::as_ptr(m), model))
    }

    pub fn get(&self, index: usize) -> Option<&Rc<Model>> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&Rc<Model>> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&Rc<Model>> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rc<Model>> {
        self.items.iter()
    }

    /// A new collection with the members matching `predicate`, in order.
    /// Its binding is derived from its own contents.
    pub fn filter(&self, predicate: impl Into<Predicate<Model>>) -> Collection {
        let predicate = predicate.into();
        let items: Vec<Rc<Model>> = self
            .items
            .iter()
            .filter(|model| predicate.matches(model))
            .cloned()
            .collect();
        let factory = items.first().map(|m| Rc::clone(m.factory()));
        Collection { items, factory }
    }

    /// JSON array of every member's attributes.
    pub fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(|m| m.to_json()).collect())
    }
}

impl IntoIterator for Collection {
    type Item = Rc<Model>;
    type IntoIter = std::vec::IntoIter<Rc<Model>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Rc<Model>;
    type IntoIter = std::slice::Iter<'a, Rc<Model>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter().map(|m| m.as_ref()))
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.factory.as_ref().map(|f| f.name()))
            .field("items", &self.items)
            .finish()
    }
}
