//! Typed accessors over a JSON object that report mismatches as
//! `SchemaViolation` with a JSON pointer to the offending value.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::document::ExtensionMap;
use crate::error::{Result, VrmError};

/// Append `key` to a JSON pointer, escaping `~` and `/`.
pub fn child_pointer(pointer: &str, key: &str) -> String {
    format!("{pointer}/{}", key.replace('~', "~0").replace('/', "~1"))
}

pub fn element_pointer(pointer: &str, index: usize) -> String {
    format!("{pointer}/{index}")
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_u64() || number.is_i64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(pointer: &str, expected: &str, value: &Value) -> VrmError {
    VrmError::schema(pointer, expected, type_name(value))
}

// ─── Scalar conversions ───────────────────────────────────────────────────────

pub(crate) fn expect_f32(value: &Value, pointer: &str) -> Result<f32> {
    value
        .as_f64()
        .map(|number| number as f32)
        .ok_or_else(|| mismatch(pointer, "number", value))
}

pub(crate) fn expect_index(value: &Value, pointer: &str) -> Result<usize> {
    value
        .as_u64()
        .and_then(|number| usize::try_from(number).ok())
        .ok_or_else(|| mismatch(pointer, "non-negative integer", value))
}

pub(crate) fn expect_str<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| mismatch(pointer, "string", value))
}

pub(crate) fn expect_bool(value: &Value, pointer: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| mismatch(pointer, "boolean", value))
}

// ─── Object reader ────────────────────────────────────────────────────────────

/// A JSON object together with the pointer it was found at.
#[derive(Debug, Clone, Copy)]
pub struct ObjectReader<'a> {
    object: &'a Map<String, Value>,
    pointer: &'a str,
}

/// Owned pointer plus reader, for children whose pointer is built on the fly.
#[derive(Debug, Clone)]
pub struct ChildObject<'a> {
    object: &'a Map<String, Value>,
    pointer: String,
}

impl<'a> ChildObject<'a> {
    pub fn new(value: &'a Value, pointer: String) -> Result<Self> {
        match value.as_object() {
            Some(object) => Ok(Self { object, pointer }),
            None => Err(mismatch(&pointer, "object", value)),
        }
    }

    pub fn reader(&self) -> ObjectReader<'_> {
        ObjectReader {
            object: self.object,
            pointer: &self.pointer,
        }
    }
}

impl<'a> ObjectReader<'a> {
    pub fn new(value: &'a Value, pointer: &'a str) -> Result<Self> {
        match value.as_object() {
            Some(object) => Ok(Self { object, pointer }),
            None => Err(mismatch(pointer, "object", value)),
        }
    }

    pub fn pointer(&self) -> &str {
        self.pointer
    }

    pub fn child_pointer(&self, key: &str) -> String {
        child_pointer(self.pointer, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field value; explicit `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key).filter(|value| !value.is_null())
    }

    pub fn object(&self, key: &str) -> Result<Option<ChildObject<'a>>> {
        self.get(key)
            .map(|value| ChildObject::new(value, self.child_pointer(key)))
            .transpose()
    }

    pub fn require_object(&self, key: &str) -> Result<ChildObject<'a>> {
        self.object(key)?
            .ok_or_else(|| VrmError::schema(self.child_pointer(key), "object", "missing"))
    }

    /// Array of objects; an absent field reads as empty.
    pub fn objects(&self, key: &str) -> Result<Vec<ChildObject<'a>>> {
        let pointer = self.child_pointer(key);
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(index, value)| ChildObject::new(value, element_pointer(&pointer, index)))
            .collect()
    }

    /// Object whose values are objects, as `(key, child)` pairs in key order.
    pub fn object_entries(&self, key: &str) -> Result<Vec<(&'a str, ChildObject<'a>)>> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let pointer = self.child_pointer(key);
        let object = value
            .as_object()
            .ok_or_else(|| mismatch(&pointer, "object", value))?;
        object
            .iter()
            .map(|(name, value)| {
                ChildObject::new(value, child_pointer(&pointer, name))
                    .map(|child| (name.as_str(), child))
            })
            .collect()
    }

    /// Object whose values are scalars, converted with `read`.
    pub fn scalar_map<T>(
        &self,
        key: &str,
        read: impl Fn(&'a Value, &str) -> Result<T>,
    ) -> Result<BTreeMap<String, T>> {
        let Some(value) = self.get(key) else {
            return Ok(BTreeMap::new());
        };
        let pointer = self.child_pointer(key);
        let object = value
            .as_object()
            .ok_or_else(|| mismatch(&pointer, "object", value))?;
        object
            .iter()
            .map(|(name, value)| Ok((name.clone(), read(value, &child_pointer(&pointer, name))?)))
            .collect()
    }

    /// Every field of this object converted with `read`.
    pub fn scalar_map_all<T>(
        &self,
        read: impl Fn(&'a Value, &str) -> Result<T>,
    ) -> Result<BTreeMap<String, T>> {
        self.object
            .iter()
            .map(|(name, value)| Ok((name.clone(), read(value, &self.child_pointer(name))?)))
            .collect()
    }

    pub fn array(&self, key: &str) -> Result<&'a [Value]> {
        match self.get(key) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(mismatch(&self.child_pointer(key), "array", other)),
        }
    }

    pub fn string(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
            .map(|value| expect_str(value, &self.child_pointer(key)).map(ToOwned::to_owned))
            .transpose()
    }

    pub fn require_string(&self, key: &str) -> Result<String> {
        self.string(key)?
            .ok_or_else(|| VrmError::schema(self.child_pointer(key), "string", "missing"))
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn strings(&self, key: &str) -> Result<Vec<String>> {
        let pointer = self.child_pointer(key);
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(index, value)| {
                expect_str(value, &element_pointer(&pointer, index)).map(ToOwned::to_owned)
            })
            .collect()
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        self.get(key)
            .map(|value| expect_bool(value, &self.child_pointer(key)))
            .transpose()
            .map(|value| value.unwrap_or(default))
    }

    pub fn f32(&self, key: &str) -> Result<Option<f32>> {
        self.get(key)
            .map(|value| expect_f32(value, &self.child_pointer(key)))
            .transpose()
    }

    pub fn f32_or(&self, key: &str, default: f32) -> Result<f32> {
        Ok(self.f32(key)?.unwrap_or(default))
    }

    pub fn require_f32(&self, key: &str) -> Result<f32> {
        self.f32(key)?
            .ok_or_else(|| VrmError::schema(self.child_pointer(key), "number", "missing"))
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| mismatch(&self.child_pointer(key), "integer", value)),
        }
    }

    pub fn index(&self, key: &str) -> Result<Option<usize>> {
        self.get(key)
            .map(|value| expect_index(value, &self.child_pointer(key)))
            .transpose()
    }

    pub fn require_index(&self, key: &str) -> Result<usize> {
        self.index(key)?.ok_or_else(|| {
            VrmError::schema(self.child_pointer(key), "non-negative integer", "missing")
        })
    }

    pub fn index_or(&self, key: &str, default: usize) -> Result<usize> {
        Ok(self.index(key)?.unwrap_or(default))
    }

    /// 0.x index: `-1` means "not set".
    pub fn vrm0_index(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => match value.as_i64() {
                Some(-1) => Ok(None),
                Some(index) if index >= 0 => Ok(usize::try_from(index).ok()),
                _ => Err(mismatch(
                    &self.child_pointer(key),
                    "non-negative integer or -1",
                    value,
                )),
            },
        }
    }

    pub fn indices(&self, key: &str) -> Result<Vec<usize>> {
        let pointer = self.child_pointer(key);
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(index, value)| expect_index(value, &element_pointer(&pointer, index)))
            .collect()
    }

    pub fn floats(&self, key: &str) -> Result<Vec<f32>> {
        let pointer = self.child_pointer(key);
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(index, value)| expect_f32(value, &element_pointer(&pointer, index)))
            .collect()
    }

    pub fn f64s(&self, key: &str) -> Result<Vec<f64>> {
        let pointer = self.child_pointer(key);
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .as_f64()
                    .ok_or_else(|| mismatch(&element_pointer(&pointer, index), "number", value))
            })
            .collect()
    }

    /// Fixed-size number array; any other length is a violation.
    pub fn float_array<const N: usize>(&self, key: &str, default: [f32; N]) -> Result<[f32; N]> {
        if !self.contains(key) {
            return Ok(default);
        }
        let values = self.floats(key)?;
        values.as_slice().try_into().map_err(|_| {
            VrmError::schema(
                self.child_pointer(key),
                format!("array of {N} numbers"),
                format!("array of {}", values.len()),
            )
        })
    }

    /// 0.x `{ "x": .., "y": .., "z": .. }` vector.
    pub fn vector3_object(&self, key: &str, default: [f32; 3]) -> Result<[f32; 3]> {
        let Some(child) = self.object(key)? else {
            return Ok(default);
        };
        let reader = child.reader();
        Ok([
            reader.f32_or("x", default[0])?,
            reader.f32_or("y", default[1])?,
            reader.f32_or("z", default[2])?,
        ])
    }

    /// String field restricted to a closed vocabulary.
    pub fn enumeration<T>(
        &self,
        key: &str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T> {
        match self.string(key)? {
            None => Ok(default),
            Some(name) => parse(&name).ok_or_else(|| {
                VrmError::schema(self.child_pointer(key), "known enumeration value", name)
            }),
        }
    }

    /// The `extensions` object, minus the names in `owned`.
    pub fn extensions_except(&self, owned: &[&str]) -> Result<ExtensionMap> {
        let Some(value) = self.get("extensions") else {
            return Ok(ExtensionMap::new());
        };
        let object = value
            .as_object()
            .ok_or_else(|| mismatch(&self.child_pointer("extensions"), "object", value))?;
        Ok(object
            .iter()
            .filter(|(name, _)| !owned.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    pub fn extensions(&self) -> Result<ExtensionMap> {
        self.extensions_except(&[])
    }

    pub fn extension(&self, name: &str) -> Option<&'a Value> {
        self.get("extensions")
            .and_then(|extensions| extensions.get(name))
            .filter(|value| !value.is_null())
    }

    pub fn extras(&self) -> Option<Value> {
        self.get("extras").cloned()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn given_string_where_number_expected_when_reading_then_pointer_is_reported() {
        let value = json!({ "weight": "heavy" });
        let reader = ObjectReader::new(&value, "/nodes/2").expect("object");

        let err = reader.f32_or("weight", 1.0).expect_err("type mismatch");
        assert!(matches!(
            err,
            VrmError::SchemaViolation { ref path, ref expected, ref actual }
                if path == "/nodes/2/weight" && expected == "number" && actual == "string"
        ));
    }

    #[test]
    fn given_vrm0_sentinel_when_reading_index_then_none_is_returned() {
        let value = json!({ "texture": -1, "node": 4, "bad": -3 });
        let reader = ObjectReader::new(&value, "").expect("object");

        assert_eq!(reader.vrm0_index("texture").expect("sentinel"), None);
        assert_eq!(reader.vrm0_index("node").expect("index"), Some(4));
        assert!(reader.vrm0_index("bad").is_err());
    }

    #[test]
    fn given_wrong_array_length_when_reading_fixed_array_then_violation_names_lengths() {
        let value = json!({ "translation": [1.0, 2.0] });
        let reader = ObjectReader::new(&value, "/nodes/0").expect("object");

        let err = reader
            .float_array("translation", [0.0; 3])
            .expect_err("length mismatch");
        assert!(err.to_string().contains("array of 3 numbers"));
    }

    #[test]
    fn given_key_with_slash_when_building_pointer_then_it_is_escaped() {
        assert_eq!(child_pointer("/extensions", "a/b~c"), "/extensions/a~1b~0c");
    }
}
