use docmodel::schema::FieldType;
use docmodel::{
    Attributes, Collection, Created, Database, DocModelError, MemoryDriver, ModelEvent,
    ModelFactory, SqliteDriver,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_timestamps_title_content_scenario() {
    let factory = ModelFactory::new("Post");
    factory
        .schema_mut()
        .timestamps()
        .and_then(|s| s.text("title", ["required"]))
        .and_then(|s| s.text("content", ()))
        .unwrap();

    {
        let schema = factory.schema();
        assert_eq!(schema.fields().len(), 4);
        assert!(schema.get("title").unwrap().required);
    }

    let post = factory.create(attrs(json!({"title": "T", "content": "C"})));
    assert_eq!(
        serde_json::to_string(&post.to_json()).unwrap(),
        r#"{"created_at":null,"modified_at":null,"title":"T","content":"C"}"#
    );
}

#[test]
fn test_relationship_fields() {
    let factory = ModelFactory::new("Post");
    factory
        .schema_mut()
        .has_one("user_id", "User", ())
        .and_then(|s| s.has_many("comments", "Comment", ()))
        .unwrap();

    let schema = factory.schema();
    let user = schema.get("user_id").unwrap();
    assert_eq!(user.reference.as_deref(), Some("User"));
    assert_eq!(user.field_type, FieldType::Id);
    let comments = schema.get("comments").unwrap();
    assert_eq!(comments.reference.as_deref(), Some("Comment"));
    assert_eq!(comments.field_type, FieldType::Array);
}

#[test]
fn test_construction_and_modification_tracking() {
    let factory = ModelFactory::new("Test");
    factory
        .schema_mut()
        .number("a", ())
        .and_then(|s| s.number("b", ()))
        .and_then(|s| s.number("c", ()))
        .unwrap();

    let model = factory.create(attrs(json!({"a": 1, "b": 2})));
    assert_eq!(model.get("a"), Some(json!(1)));
    assert_eq!(model.get("b"), Some(json!(2)));
    assert_eq!(model.get("c"), Some(Value::Null));
    assert!(!model.is_modified());
    assert!(model.is_new());

    model.set("a", 99).unwrap();
    model.set("a", 100).unwrap();
    assert!(model.is_modified());
    assert_eq!(model.modified_fields(), vec!["a"]);
}

#[test]
fn test_heterogeneous_collection_keeps_first_item() {
    let f1 = ModelFactory::new("F1");
    f1.schema_mut().text("a", ()).and_then(|s| s.text("b", ())).unwrap();
    let f2 = ModelFactory::new("F2");
    f2.schema_mut().text("c", ()).and_then(|s| s.text("d", ())).unwrap();

    let first = f1.create(Attributes::new());
    let mut collection = Collection::new();
    let err = collection
        .add(vec![Rc::clone(&first), f2.create(Attributes::new())])
        .unwrap_err();
    assert!(matches!(err, DocModelError::HeterogeneousCollection { .. }));
    assert_eq!(collection.len(), 1);

    collection.add(&first).unwrap();
    assert_eq!(collection.len(), 1);
}

#[test]
fn test_create_from_dynamic_input() {
    let factory = ModelFactory::new("Tag");
    factory.schema_mut().text("name", ()).unwrap();

    match factory.create_from(json!([{"name": "a"}, [{"name": "b"}]])).unwrap() {
        Created::Many(collection) => assert_eq!(collection.len(), 2),
        Created::One(_) => panic!("expected a collection"),
    }
    assert!(matches!(
        factory.create_from(json!([{"name": "a"}, 3])).unwrap_err(),
        DocModelError::NotAModelInstance(_)
    ));
}

#[test]
fn test_create_notifications() {
    let factory = ModelFactory::new("Note");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    factory.on_create(move |model| sink.borrow_mut().push(model.to_json()));
    let rx = factory.subscribe();

    factory.create(attrs(json!({"body": "hi"})));
    assert_eq!(*seen.borrow(), vec![json!({"body": "hi"})]);
    let ModelEvent::Created(model) = rx.try_recv().unwrap();
    assert_eq!(model.model_name(), "Note");
}

#[test]
fn test_registry_over_each_driver() {
    fn exercise<D: docmodel::Driver>(mut db: Database<D>) {
        db.connect().unwrap();
        let users = db
            .model("User", |_, schema| {
                schema.text("name", "required")?;
                Ok(())
            })
            .unwrap();
        let class = users.model();
        let alice = users.create(attrs(json!({"name": "Alice"})));
        let id = class.save(&alice).unwrap();

        let all = class.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.first().unwrap().get("name"), Some(json!("Alice")));
        assert!(class.find(&id).unwrap().is_some());

        let numbered = users.create(attrs(json!({"_id": 7, "name": "Bob"})));
        let numeric_id = class.save(&numbered).unwrap();
        assert_eq!(numeric_id, "7");
        let found = class.find(&numeric_id).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(json!("Bob")));

        db.disconnect().unwrap();
        let pending = users.create(attrs(json!({"name": "Carol"})));
        let before = pending.to_json();
        assert!(class.save(&pending).is_err());
        assert_eq!(pending.to_json(), before);
        assert!(pending.is_new());
    }

    exercise(Database::new(MemoryDriver::new()));
    exercise(Database::new(SqliteDriver::in_memory()));
}

#[test]
fn test_yaml_definitions() {
    let defs = docmodel::parse_definitions_str(
        r#"
models:
  Post:
    timestamps: true
    fields:
      - { name: title, options: required }
      - { name: content }
"#,
    )
    .unwrap();
    let mut db = Database::new(MemoryDriver::new());
    defs.register(&mut db).unwrap();
    let post = db
        .factory("Post")
        .unwrap()
        .create(attrs(json!({"title": "T", "content": "C"})));
    assert_eq!(
        post.to_json(),
        json!({"created_at": null, "modified_at": null, "title": "T", "content": "C"})
    );
}
