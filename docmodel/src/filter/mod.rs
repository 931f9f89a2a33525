// Predicates shared by Schema::filter and Collection::filter

use crate::util::is_truthy;
use serde_json::{Map, Value};
use std::fmt;

/// Something whose named attributes can be inspected by a [`Predicate`].
pub trait Filterable {
    /// Current value of an attribute, or `None` if the attribute does not exist.
    fn attribute(&self, name: &str) -> Option<Value>;
}

/// A filter over fields or models.
pub enum Predicate<T: ?Sized> {
    /// Every key/value pair must equal the item's attribute.
    Matches(Map<String, Value>),
    /// The named attribute must be truthy.
    Truthy(String),
    /// Arbitrary test.
    Custom(Box<dyn Fn(&T) -> bool>),
}

impl<T: Filterable + ?Sized> Predicate<T> {
    pub fn custom(f: impl Fn(&T) -> bool + 'static) -> Self {
        Predicate::Custom(Box::new(f))
    }

    pub fn matches(&self, item: &T) -> bool {
        match self {
            Predicate::Matches(expected) => expected
                .iter()
                .all(|(key, value)| item.attribute(key).as_ref() == Some(value)),
            Predicate::Truthy(name) => item.attribute(name).map(|v| is_truthy(&v)).unwrap_or(false),
            Predicate::Custom(f) => f(item),
        }
    }
}

impl<T: ?Sized> From<&str> for Predicate<T> {
    fn from(name: &str) -> Self {
        Predicate::Truthy(name.to_string())
    }
}

impl<T: ?Sized> From<String> for Predicate<T> {
    fn from(name: String) -> Self {
        Predicate::Truthy(name)
    }
}

impl<T: ?Sized> From<Map<String, Value>> for Predicate<T> {
    fn from(map: Map<String, Value>) -> Self {
        Predicate::Matches(map)
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Matches(map) => f.debug_tuple("Matches").field(map).finish(),
            Predicate::Truthy(name) => f.debug_tuple("Truthy").field(name).finish(),
            Predicate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
