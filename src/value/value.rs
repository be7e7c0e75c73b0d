//! Core value types and operations.

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value represents a JSON/YAML value that can be any of the supported types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
}

/// Map represents a key-value map where keys are strings.
///
/// Keys are kept sorted, so encoding a map always emits its fields in the
/// same order regardless of the order they were read in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Map {
    pub fields: BTreeMap<String, Value>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Follows a chain of map fields from this value.
    ///
    /// Returns `None` as soon as a step is missing or the value at that step
    /// is not a map.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(self, |current, field| current.as_map()?.get(field))
    }

    /// Mutable counterpart of [`Value::lookup`].
    pub fn lookup_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
        path.iter()
            .try_fold(self, |current, field| current.as_map_mut()?.get_mut(field))
    }

    /// Returns the string at `path`, if there is one.
    pub fn lookup_str(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// Returns a short name for the kind of value, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl Map {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        ValueSeed { source: None }.deserialize(deserializer)
    }
}

/// Decodes a [`Value`], optionally knowing the YAML text being decoded.
///
/// With the source text at hand, plain scalars written as YAML 1.1 octal
/// (`0644`) decode to integers, the way Kubernetes reads them. Quoted
/// scalars always stay strings.
#[derive(Clone, Copy)]
struct ValueSeed<'s> {
    source: Option<&'s str>,
}

impl<'de, 's> DeserializeSeed<'de> for ValueSeed<'s> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'s> ValueSeed<'s> {
    /// Returns true if `scalar` is a slice of the source that was not
    /// written inside quotes.
    fn is_plain(&self, scalar: &str) -> bool {
        let Some(source) = self.source else {
            return false;
        };
        let start = source.as_ptr() as usize;
        let at = scalar.as_ptr() as usize;
        if at < start || at + scalar.len() > start + source.len() {
            return false;
        }
        match (at - start).checked_sub(1) {
            Some(before) => !matches!(source.as_bytes()[before], b'\'' | b'"'),
            None => true,
        }
    }
}

/// Parses YAML 1.1 octal such as `0644` or `-017`.
fn parse_octal(scalar: &str) -> Option<i64> {
    let (negative, unsigned) = match scalar.as_bytes().first() {
        Some(b'-') => (true, &scalar[1..]),
        Some(b'+') => (false, &scalar[1..]),
        _ => (false, scalar),
    };
    let digits = unsigned.strip_prefix('0')?;
    if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    let value = i64::from_str_radix(digits, 8).ok()?;
    Some(if negative { -value } else { value })
}

impl<'de, 's> Visitor<'de> for ValueSeed<'s> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON or YAML value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        self.deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::UInt(v), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<Value, E> {
        if self.is_plain(v) {
            if let Some(octal) = parse_octal(v) {
                return Ok(Value::Int(octal));
            }
        }
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self)? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self)?;
            fields.insert(key, value);
        }
        Ok(Value::Map(Map { fields }))
    }
}

/// Parse a value from JSON.
pub fn from_json(json: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse a single value from YAML.
pub fn from_yaml(yaml: &str) -> Result<Value, serde_yaml::Error> {
    let seed = ValueSeed { source: Some(yaml) };
    seed.deserialize(serde_yaml::Deserializer::from_str(yaml))
}

/// Parse every document of a multi-document YAML stream, in stream order.
///
/// Empty documents come back as [`Value::Null`].
pub fn from_yaml_documents(yaml: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    let seed = ValueSeed { source: Some(yaml) };
    serde_yaml::Deserializer::from_str(yaml)
        .map(|document| seed.deserialize(document))
        .collect()
}

/// Serialize a value to YAML.
pub fn to_yaml(value: &Value) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(3).type_name(), "int");
        assert_eq!(Value::UInt(u64::MAX).type_name(), "int");
        assert_eq!(Value::List(vec![]).type_name(), "list");
    }

    #[test]
    fn test_map_operations() {
        let value = from_yaml("key: value\n").unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("key"), Some(&Value::String("value".into())));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn test_lookup() {
        let value = from_yaml("spec:\n  template:\n    name: web\n").unwrap();
        assert_eq!(value.lookup_str(&["spec", "template", "name"]), Some("web"));
        assert_eq!(value.lookup(&["spec", "missing"]), None);
        assert_eq!(value.lookup(&["spec", "template", "name", "deeper"]), None);
    }

    #[test]
    fn test_lookup_mut() {
        let mut value = from_yaml("spec:\n  replicas: 1\n").unwrap();
        *value.lookup_mut(&["spec", "replicas"]).unwrap() = Value::Int(3);
        assert_eq!(value.lookup(&["spec", "replicas"]), Some(&Value::Int(3)));
    }

    #[test]
    fn test_scalars_from_yaml() {
        let value = from_yaml("a: 1\nb: 1.5\nc: true\nd: null\ne: \"1800\"\n").unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::Float(1.5)));
        assert_eq!(map.get("c"), Some(&Value::Bool(true)));
        assert_eq!(map.get("d"), Some(&Value::Null));
        assert_eq!(map.get("e"), Some(&Value::String("1800".into())));
    }

    #[test]
    fn test_plain_octal_is_an_integer() {
        let value = from_yaml("a: 0644\nb: '0644'\nc: \"0644\"\nd: 0855\ne: [0755, -010]\nf: 0\n").unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(420)));
        assert_eq!(map.get("b"), Some(&Value::String("0644".into())));
        assert_eq!(map.get("c"), Some(&Value::String("0644".into())));
        assert_eq!(map.get("d"), Some(&Value::String("0855".into())));
        assert_eq!(
            map.get("e"),
            Some(&Value::List(vec![Value::Int(493), Value::Int(-8)]))
        );
        assert_eq!(map.get("f"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_octal_in_later_documents() {
        let docs = from_yaml_documents("a: '0600'\n---\nmode: 0600\n").unwrap();
        assert_eq!(docs[0].lookup(&["a"]), Some(&Value::String("0600".into())));
        assert_eq!(docs[1].lookup(&["mode"]), Some(&Value::Int(384)));
    }

    #[test]
    fn test_large_unsigned_integers() {
        let value = from_yaml("big: 18446744073709551615\nsmall: 7\n").unwrap();
        assert_eq!(value.lookup(&["big"]), Some(&Value::UInt(u64::MAX)));
        assert_eq!(value.lookup(&["small"]), Some(&Value::Int(7)));
        assert_eq!(
            to_yaml(&value).unwrap(),
            "big: 18446744073709551615\nsmall: 7\n"
        );
    }

    #[test]
    fn test_json_strings_stay_strings() {
        let value = from_json(r#"{"mode": "0644", "n": 18446744073709551615}"#).unwrap();
        assert_eq!(value.lookup_str(&["mode"]), Some("0644"));
        assert_eq!(value.lookup(&["n"]), Some(&Value::UInt(u64::MAX)));
    }

    #[test]
    fn test_yaml_documents() {
        let docs = from_yaml_documents("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].lookup(&["b"]), Some(&Value::Int(2)));
    }

    #[test]
    fn test_yaml_output_sorts_keys() {
        let value = from_yaml("zeta: 1\nalpha:\n  inner: {}\n  list:\n  - x\n").unwrap();
        assert_eq!(
            to_yaml(&value).unwrap(),
            "alpha:\n  inner: {}\n  list:\n  - x\nzeta: 1\n"
        );
    }
}
