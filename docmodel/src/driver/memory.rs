// In-process document store, mostly for tests and tooling

use super::{DocumentStore, Driver};
use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use crate::model::{Attributes, ModelClass};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Documents held in memory, keyed by table then id. Insertion order is kept.
#[derive(Debug, Default)]
pub struct MemoryStore {
    connected: Cell<bool>,
    tables: RefCell<HashMap<String, IndexMap<String, Attributes>>>,
}

impl MemoryStore {
    fn ensure_connected(&self) -> Result<()> {
        if self.connected.get() {
            Ok(())
        } else {
            Err(DocModelError::NotConnected(MemoryDriver::URL.to_string()))
        }
    }

    /// Number of documents stored in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.tables.borrow().get(table).map(|t| t.len()).unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn find_all(&self, table: &str) -> Result<Vec<Attributes>> {
        self.ensure_connected()?;
        Ok(self
            .tables
            .borrow()
            .get(table)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save(&self, table: &str, id: &str, document: &Attributes) -> Result<()> {
        self.ensure_connected()?;
        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    fn remove(&self, table: &str, id: &str) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self
            .tables
            .borrow_mut()
            .get_mut(table)
            .and_then(|docs| docs.shift_remove(id))
            .is_some())
    }
}

/// Driver over a [`MemoryStore`]. Data survives disconnects but is not
/// reachable while disconnected.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    store: Rc<MemoryStore>,
}

impl MemoryDriver {
    pub const URL: &'static str = "memory://";

    pub fn new() -> Self {
        MemoryDriver::default()
    }

    pub fn store(&self) -> &Rc<MemoryStore> {
        &self.store
    }
}

impl Driver for MemoryDriver {
    fn url(&self) -> &str {
        Self::URL
    }

    fn is_connected(&self) -> bool {
        self.store.connected.get()
    }

    fn connect(&mut self) -> Result<()> {
        self.store.connected.set(true);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.store.connected.set(false);
        Ok(())
    }

    fn model_class(&self, factory: Weak<ModelFactory>) -> Result<ModelClass> {
        let store: Rc<dyn DocumentStore> = self.store.clone();
        Ok(ModelClass::with_store("MemoryModel", factory, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Database;
    use crate::schema::{CREATED_AT, MODIFIED_AT};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    fn connected_db() -> Database<MemoryDriver> {
        let mut db = Database::new(MemoryDriver::new());
        db.connect().unwrap();
        db
    }

    #[test]
    fn test_queries_require_connection() {
        let mut db = Database::new(MemoryDriver::new());
        let posts = db.define("Post").unwrap();
        assert!(matches!(posts.model().all().unwrap_err(), DocModelError::NotConnected(_)));
    }

    #[test]
    fn test_save_assigns_id_and_timestamps() {
        let mut db = connected_db();
        let posts = db
            .model("Post", |_, schema| {
                schema.timestamps()?.text("title", ())?;
                Ok(())
            })
            .unwrap();

        let post = posts.create(attrs(json!({"title": "Hello"})));
        post.set("title", "Hello again").unwrap();
        assert!(post.is_modified());

        let id = posts.model().save(&post).unwrap();
        assert_eq!(post.id().as_deref(), Some(id.as_str()));
        assert!(post.get(CREATED_AT).unwrap().is_string());
        assert!(post.get(MODIFIED_AT).unwrap().is_string());
        assert!(!post.is_new());
        assert!(!post.is_modified());
        assert_eq!(db.driver().store().count("post"), 1);
    }

    #[test]
    fn test_all_returns_bound_collection() {
        let mut db = connected_db();
        let posts = db
            .model("Post", |_, schema| {
                schema.text("title", ())?;
                Ok(())
            })
            .unwrap();
        let class = posts.model();
        for title in ["a", "b", "c"] {
            class.save(&posts.create(attrs(json!({"title": title})))).unwrap();
        }

        let all = class.all().unwrap();
        assert_eq!(all.len(), 3);
        assert!(Rc::ptr_eq(all.factory().unwrap(), &posts));
        let titles: Vec<Value> = all.iter().map(|m| m.get("title").unwrap()).collect();
        assert_eq!(titles, vec![json!("a"), json!("b"), json!("c")]);
        assert!(all.iter().all(|m| m.is_new() && !m.is_modified()));
    }

    #[test]
    fn test_find_and_remove() {
        let mut db = connected_db();
        let users = db.define("User").unwrap();
        let class = users.model();
        let user = users.create(attrs(json!({"_id": "alice"})));
        class.save(&user).unwrap();

        let found = class.find("alice").unwrap().unwrap();
        assert_eq!(found.id().as_deref(), Some("alice"));
        assert!(!Rc::ptr_eq(&found, &user));

        assert!(class.remove(&user).unwrap());
        assert!(!class.remove(&user).unwrap());
        assert!(class.find("alice").unwrap().is_none());
    }

    #[test]
    fn test_numeric_id_found_by_saved_id() {
        let mut db = connected_db();
        let users = db.define("User").unwrap();
        let class = users.model();
        let id = class.save(&users.create(attrs(json!({"_id": 5})))).unwrap();
        assert_eq!(id, "5");

        let found = class.find(&id).unwrap().unwrap();
        assert_eq!(found.to_json()["_id"], json!(5));
        assert_eq!(class.find_by("_id", &json!(5)).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_save_leaves_record_untouched() {
        let mut db = Database::new(MemoryDriver::new());
        let posts = db
            .model("Post", |_, schema| {
                schema.timestamps()?.text("title", ())?;
                Ok(())
            })
            .unwrap();
        let post = posts.create(attrs(json!({"title": "T"})));
        post.set("title", "T2").unwrap();
        let before = post.to_json();

        let err = posts.model().save(&post).unwrap_err();
        assert!(matches!(err, DocModelError::NotConnected(_)));
        assert_eq!(post.to_json(), before);
        assert!(post.id().is_none());
        assert_eq!(post.modified_fields(), vec!["title"]);
    }

    #[test]
    fn test_save_rejects_foreign_model() {
        let mut db = connected_db();
        let users = db.define("User").unwrap();
        let posts = db.define("Post").unwrap();
        let post = posts.create(Attributes::new());
        let err = users.model().save(&post).unwrap_err();
        assert!(matches!(err, DocModelError::NotAModelInstance(_)));
    }
}
