//! Mapping a parsed tree onto a target type with case-insensitive keys.
//!
//! The tree is handed to serde through [`FieldMatcher`], which sees the
//! field names each struct expects and renames table keys that differ from
//! one of them only by ASCII case. Everything else is delegated to the
//! `config` crate's own deserializer, so its scalar conversions still apply.

use config::{ConfigError as TreeError, Map, Value, ValueKind};
use serde::de::value::StringDeserializer;
use serde::de::{
    self, Deserialize, DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess,
    IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use std::collections::HashSet;

/// Deserialize `tree` into `T`, matching table keys to struct fields
/// regardless of case.
pub(crate) fn deserialize_tree<T>(tree: Value) -> Result<T, TreeError>
where
    T: DeserializeOwned,
{
    T::deserialize(FieldMatcher(tree))
}

struct FieldMatcher(Value);

/// Rename keys of `table` to the struct field they match ignoring case.
///
/// A key that already equals a field is kept as is and wins over any other
/// spelling of the same field, which is then passed through unchanged.
fn match_fields(table: Map<String, Value>, fields: &'static [&'static str]) -> Vec<(String, Value)> {
    let exact: HashSet<&str> = table
        .keys()
        .filter(|key| fields.contains(&key.as_str()))
        .map(String::as_str)
        .collect();
    let renames: Vec<Option<&'static str>> = table
        .keys()
        .map(|key| {
            if exact.contains(key.as_str()) {
                return None;
            }
            fields
                .iter()
                .copied()
                .find(|field| field.eq_ignore_ascii_case(key) && !exact.contains(field))
        })
        .collect();

    let mut claimed: HashSet<&'static str> = HashSet::new();
    table
        .into_iter()
        .zip(renames)
        .map(|((key, value), rename)| match rename {
            Some(field) if claimed.insert(field) => (field.to_string(), value),
            _ => (key, value),
        })
        .collect()
}

macro_rules! delegate {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TreeError> {
            self.0.$method(visitor)
        }
    )*};
}

impl<'de> Deserializer<'de> for FieldMatcher {
    type Error = TreeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TreeError> {
        match self.0.kind {
            ValueKind::Table(table) => visitor.visit_map(Entries::new(table.into_iter().collect())),
            ValueKind::Array(items) => visitor.visit_seq(Items(items.into_iter())),
            kind => Value::new(None, kind).deserialize_any(visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        match self.0.kind {
            ValueKind::Table(table) => visitor.visit_map(Entries::new(match_fields(table, fields))),
            kind => Value::new(None, kind).deserialize_struct(name, fields, visitor),
        }
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TreeError> {
        match self.0.kind {
            ValueKind::Table(table) => visitor.visit_map(Entries::new(table.into_iter().collect())),
            kind => Value::new(None, kind).deserialize_map(visitor),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TreeError> {
        match self.0.kind {
            ValueKind::Array(items) => visitor.visit_seq(Items(items.into_iter())),
            kind => Value::new(None, kind).deserialize_seq(visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TreeError> {
        match self.0.kind {
            ValueKind::Nil => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        self.0.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        match self.0.kind {
            ValueKind::Table(table) if table.len() == 1 => {
                let mut entries = table.into_iter();
                match entries.next() {
                    Some((variant, value)) => visitor.visit_enum(Variant { variant, value }),
                    None => Err(de::Error::custom("empty enum table")),
                }
            }
            kind => Value::new(None, kind).deserialize_enum(name, variants, visitor),
        }
    }

    delegate! {
        deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64
        deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf
        deserialize_unit deserialize_identifier deserialize_ignored_any
    }
}

struct Entries {
    entries: std::vec::IntoIter<(String, Value)>,
    pending: Option<Value>,
}

impl Entries {
    fn new(entries: Vec<(String, Value)>) -> Self {
        Self {
            entries: entries.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for Entries {
    type Error = TreeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, TreeError> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                let key: StringDeserializer<TreeError> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, TreeError> {
        match self.pending.take() {
            Some(value) => seed.deserialize(FieldMatcher(value)),
            None => Err(de::Error::custom("value requested before its key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct Items(std::vec::IntoIter<Value>);

impl<'de> SeqAccess<'de> for Items {
    type Error = TreeError;

    fn next_element_seed<S: DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> Result<Option<S::Value>, TreeError> {
        self.0
            .next()
            .map(|item| seed.deserialize(FieldMatcher(item)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

struct Variant {
    variant: String,
    value: Value,
}

impl<'de> EnumAccess<'de> for Variant {
    type Error = TreeError;
    type Variant = FieldMatcher;

    fn variant_seed<S: DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> Result<(S::Value, FieldMatcher), TreeError> {
        let variant: StringDeserializer<TreeError> = self.variant.into_deserializer();
        Ok((seed.deserialize(variant)?, FieldMatcher(self.value)))
    }
}

impl<'de> de::VariantAccess<'de> for FieldMatcher {
    type Error = TreeError;

    fn unit_variant(self) -> Result<(), TreeError> {
        Deserialize::deserialize(self)
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value, TreeError> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, TreeError> {
        self.deserialize_seq(visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, TreeError> {
        self.deserialize_struct("", fields, visitor)
    }
}
