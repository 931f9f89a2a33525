use super::{matches_attribute, DocumentStore, Driver};
use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use crate::model::{Attributes, ModelClass, ID_KEY};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Connection string that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Documents kept as JSON in a single SQLite table.
#[derive(Debug, Default)]
pub struct SqliteStore {
    conn: RefCell<Option<Connection>>,
}

impl SqliteStore {
    fn open(&self, url: &str) -> Result<()> {
        let conn = if url == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(url)?
        };
        initialize_tables(&conn)?;
        *self.conn.borrow_mut() = Some(conn);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.borrow_mut().take() {
            conn.close().map_err(|(_, e)| DocModelError::Sqlite(e))?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.borrow().is_some()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        match self.conn.borrow().as_ref() {
            Some(conn) => f(conn),
            None => Err(DocModelError::NotConnected("sqlite".to_string())),
        }
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql], table: &str) -> Result<Vec<Attributes>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(args, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut docs = Vec::new();
            for row in rows {
                let (id, data_json) = row?;
                match serde_json::from_str::<Value>(&data_json)? {
                    Value::Object(doc) => docs.push(doc),
                    other => log::warn!(
                        "Skipping document {table}/{id}: expected a JSON object, found {}",
                        crate::util::value_kind(&other)
                    ),
                }
            }
            Ok(docs)
        })
    }
}

fn initialize_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data_json TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        ",
    )?;
    Ok(())
}

impl DocumentStore for SqliteStore {
    fn find_all(&self, table: &str) -> Result<Vec<Attributes>> {
        self.query(
            "SELECT id, data_json FROM documents WHERE collection = ?1 ORDER BY rowid",
            &[&table],
            table,
        )
    }

    fn find_by(&self, table: &str, key: &str, value: &Value) -> Result<Vec<Attributes>> {
        // The id column mirrors `_id`, so that lookup stays in SQL.
        if key == ID_KEY {
            if let Value::String(id) = value {
                return self.query(
                    "SELECT id, data_json FROM documents WHERE collection = ?1 AND id = ?2",
                    &[&table, id],
                    table,
                );
            }
        }
        Ok(self
            .find_all(table)?
            .into_iter()
            .filter(|doc| matches_attribute(doc, key, value))
            .collect())
    }

    fn save(&self, table: &str, id: &str, document: &Attributes) -> Result<()> {
        let data_json = serde_json::to_string(document)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, data_json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO UPDATE SET data_json = excluded.data_json",
                params![table, id, data_json],
            )?;
            Ok(())
        })
    }

    fn remove(&self, table: &str, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![table, id],
            )?;
            Ok(deleted > 0)
        })
    }
}

/// Driver storing documents in a SQLite file, or in memory for [`IN_MEMORY`].
#[derive(Debug)]
pub struct SqliteDriver {
    url: String,
    store: Rc<SqliteStore>,
}

impl SqliteDriver {
    pub fn new(url: impl Into<String>) -> Self {
        SqliteDriver {
            url: url.into(),
            store: Rc::new(SqliteStore::default()),
        }
    }

    /// A driver over a private in-memory database.
    pub fn in_memory() -> Self {
        SqliteDriver::new(IN_MEMORY)
    }

    pub fn store(&self) -> &Rc<SqliteStore> {
        &self.store
    }
}

impl Driver for SqliteDriver {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_connected(&self) -> bool {
        self.store.is_open()
    }

    fn connect(&mut self) -> Result<()> {
        self.store.open(&self.url)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.store.close()
    }

    fn model_class(&self, factory: Weak<ModelFactory>) -> Result<ModelClass> {
        let store: Rc<dyn DocumentStore> = self.store.clone();
        Ok(ModelClass::with_store("SqliteModel", factory, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    fn posts(db: &mut Database<SqliteDriver>) -> Rc<ModelFactory> {
        db.model("Post", |_, schema| {
            schema.text("title", ())?.number("views", ())?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_store_requires_connection() {
        let store = SqliteStore::default();
        assert!(matches!(store.find_all("post").unwrap_err(), DocModelError::NotConnected(_)));
        assert!(store.close().is_ok());
    }

    #[test]
    fn test_save_and_load_in_memory() {
        let mut db = Database::new(SqliteDriver::in_memory());
        db.connect().unwrap();
        let posts = posts(&mut db);
        let class = posts.model();
        assert_eq!(class.name(), "SqliteModel");

        let first = posts.create(attrs(json!({"title": "First", "views": 3})));
        let second = posts.create(attrs(json!({"title": "Second"})));
        class.save(&first).unwrap();
        class.save(&second).unwrap();

        first.set("views", 4).unwrap();
        class.save(&first).unwrap();

        let all = class.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get(0).unwrap().get("views"), Some(json!(4)));
        assert_eq!(all.get(1).unwrap().get("title"), Some(json!("Second")));

        let found = class.find(&first.id().unwrap()).unwrap().unwrap();
        assert_eq!(found.get("title"), Some(json!("First")));

        let by_title = class.find_by("title", &json!("Second")).unwrap();
        assert_eq!(by_title.len(), 1);

        assert!(class.remove(&second).unwrap());
        assert_eq!(class.all().unwrap().len(), 1);
    }

    #[test]
    fn test_file_database_survives_reconnect() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docs.sqlite");
        let mut db = Database::new(SqliteDriver::new(path.to_string_lossy()));
        db.connect().unwrap();
        let posts = posts(&mut db);
        let id = posts
            .model()
            .save(&posts.create(attrs(json!({"title": "Kept"}))))
            .unwrap();

        db.disconnect().unwrap();
        assert!(!db.is_connected());
        assert!(posts.model().all().is_err());

        db.connect().unwrap();
        let found = posts.model().find(&id).unwrap().unwrap();
        assert_eq!(found.get("title"), Some(json!("Kept")));
    }

    #[test]
    fn test_non_object_documents_are_skipped() {
        let mut db = Database::new(SqliteDriver::in_memory());
        db.connect().unwrap();
        let posts = posts(&mut db);
        db.driver()
            .store()
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, data_json) VALUES ('post', 'x', '[1, 2]')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(posts.model().all().unwrap().is_empty());
    }
}
