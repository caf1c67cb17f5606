//! Field-by-field reader that collects validation issues.

use serde_json::{Map, Value};

use super::{ParseError, ValidationIssue};

pub(crate) type Object = Map<String, Value>;

/// Reads typed fields out of JSON objects, substituting defaults for absent
/// fields and recording every wrongly typed one.
#[derive(Debug, Default)]
pub(crate) struct Reader {
    issues: Vec<ValidationIssue>,
}

pub(crate) fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

pub(crate) fn index_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// Non-negative milliseconds. JS numbers may arrive as floats; a fractional
/// part is truncated toward zero.
fn as_ms(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// `null` is treated like an absent field.
fn field<'v>(obj: &'v Object, key: &str) -> Option<&'v Value> {
    obj.get(key).filter(|value| !value.is_null())
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, path: String, expected: &'static str) {
        self.issues.push(ValidationIssue { path, expected });
    }

    /// The root value as an object.
    pub fn root<'v>(&mut self, value: &'v Value) -> Option<&'v Object> {
        let obj = value.as_object();
        if obj.is_none() {
            self.issue(String::new(), "object");
        }
        obj
    }

    pub fn bool(&mut self, obj: &Object, path: &str, key: &str, default: bool) -> bool {
        match field(obj, key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.issue(child_path(path, key), "boolean");
                default
            }
        }
    }

    pub fn string(&mut self, obj: &Object, path: &str, key: &str, default: &str) -> String {
        match field(obj, key) {
            None => default.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.issue(child_path(path, key), "string");
                default.to_string()
            }
        }
    }

    /// Non-negative integer strictly below `limit`.
    pub fn ms_below(&mut self, obj: &Object, path: &str, key: &str, default: u64, limit: u64) -> u64 {
        match field(obj, key) {
            None => default,
            Some(value) => match as_ms(value) {
                Some(ms) if ms < limit => ms,
                _ => {
                    self.issue(child_path(path, key), "non-negative integer in range");
                    default
                }
            },
        }
    }

    pub fn ms(&mut self, obj: &Object, path: &str, key: &str, default: u64) -> u64 {
        match field(obj, key) {
            None => default,
            Some(value) => as_ms(value).unwrap_or_else(|| {
                self.issue(child_path(path, key), "non-negative integer");
                default
            }),
        }
    }

    pub fn object<'v>(&mut self, obj: &'v Object, path: &str, key: &str) -> Option<&'v Object> {
        match field(obj, key) {
            None => None,
            Some(Value::Object(inner)) => Some(inner),
            Some(_) => {
                self.issue(child_path(path, key), "object");
                None
            }
        }
    }

    pub fn array<'v>(&mut self, obj: &'v Object, path: &str, key: &str) -> Option<&'v Vec<Value>> {
        match field(obj, key) {
            None => None,
            Some(Value::Array(items)) => Some(items),
            Some(_) => {
                self.issue(child_path(path, key), "array");
                None
            }
        }
    }

    pub fn string_list(&mut self, obj: &Object, path: &str, key: &str) -> Vec<String> {
        let Some(items) = self.array(obj, path, key) else {
            return Vec::new();
        };
        let list_path = child_path(path, key);
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => out.push(s.clone()),
                _ => self.issue(index_path(&list_path, i), "string"),
            }
        }
        out
    }

    /// Fixed-length array of booleans.
    pub fn bool_array<const N: usize>(
        &mut self,
        obj: &Object,
        path: &str,
        key: &str,
        default: [bool; N],
    ) -> [bool; N] {
        let Some(value) = field(obj, key) else {
            return default;
        };
        let parsed = value.as_array().filter(|items| items.len() == N).and_then(|items| {
            let mut out = [false; N];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item.as_bool()?;
            }
            Some(out)
        });
        parsed.unwrap_or_else(|| {
            self.issue(child_path(path, key), "fixed-length array of booleans");
            default
        })
    }

    pub fn into_error(self) -> ParseError {
        ParseError::Invalid(self.issues)
    }

    pub fn finish<T>(self, value: T) -> Result<T, ParseError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(ParseError::Invalid(self.issues))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collects_all_issues() {
        let value = json!({"a": 1, "b": "x", "c": [true, 1], "d": null});
        let obj = value.as_object().unwrap();
        let mut reader = Reader::new();

        assert!(reader.bool(obj, "", "a", true));
        assert_eq!(reader.ms(obj, "", "b", 5), 5);
        assert_eq!(reader.bool_array(obj, "", "c", [false; 2]), [false; 2]);
        assert_eq!(reader.string(obj, "", "d", "fallback"), "fallback");

        match reader.finish(()) {
            Err(ParseError::Invalid(issues)) => {
                let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
                assert_eq!(paths, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nested_paths() {
        let value = json!({"list": {"items": ["ok", 3]}});
        let obj = value.as_object().unwrap();
        let mut reader = Reader::new();

        let list = reader.object(obj, "", "list").unwrap();
        assert_eq!(reader.string_list(list, "list", "items"), vec!["ok".to_string()]);

        let err = reader.finish(()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid fields: list.items[1]: expected string");
    }

    #[test]
    fn test_ms_truncates_fractions() {
        let value = json!({"elapsed": 1500.7, "tiny": 0.2, "neg": -0.5});
        let obj = value.as_object().unwrap();
        let mut reader = Reader::new();

        assert_eq!(reader.ms(obj, "", "elapsed", 0), 1500);
        assert_eq!(reader.ms(obj, "", "tiny", 9), 0);
        assert_eq!(reader.ms(obj, "", "neg", 9), 9);
        assert_eq!(
            reader.finish(()).unwrap_err().to_string(),
            "Invalid fields: neg: expected non-negative integer"
        );
    }

    #[test]
    fn test_ms_accepts_whole_floats() {
        let value = json!({"t": 1500.0, "neg": -1, "big": 90_000_000});
        let obj = value.as_object().unwrap();
        let mut reader = Reader::new();

        assert_eq!(reader.ms(obj, "", "t", 0), 1500);
        assert_eq!(reader.ms(obj, "", "neg", 0), 0);
        assert_eq!(reader.ms_below(obj, "", "big", 0, 86_400_000), 0);
        assert!(reader.finish(()).is_err());
    }
}
