// Naming and dynamic-value helpers shared across the crate

use heck::ToSnakeCase;
use serde_json::Value;

/// Normalize a user-supplied field name to snake_case.
/// e.g. "textField" -> "text_field", "Created At" -> "created_at".
/// Digit runs are words of their own: "field1" -> "field_1".
pub fn normalize_field_name(input: &str) -> String {
    split_digit_runs(&input.to_snake_case())
}

fn split_digit_runs(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len() + 4);
    let mut prev: Option<char> = None;
    for c in snake.chars() {
        if let Some(p) = prev {
            if p != '_' && c != '_' && p.is_ascii_digit() != c.is_ascii_digit() {
                out.push('_');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Derive the default table/collection name for a model.
/// The model name is lowercased before conversion, so "BlogPost" -> "blogpost".
pub fn table_name(model_name: &str) -> String {
    model_name.to_lowercase().to_snake_case()
}

/// Truthiness of a dynamic value: null, false, 0, NaN and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Short name of a value's shape, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("textField"), "text_field");
        assert_eq!(normalize_field_name("created_at"), "created_at");
        assert_eq!(normalize_field_name("Created At"), "created_at");
    }

    #[test]
    fn test_normalize_field_name_splits_digits() {
        assert_eq!(normalize_field_name("field1"), "field_1");
        assert_eq!(normalize_field_name("address2Line"), "address_2_line");
        assert_eq!(normalize_field_name("line_2"), "line_2");
    }

    #[test]
    fn test_table_name_lowercases_first() {
        assert_eq!(table_name("Post"), "post");
        assert_eq!(table_name("BlogPost"), "blogpost");
        assert_eq!(table_name("blog post"), "blog_post");
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }
}
