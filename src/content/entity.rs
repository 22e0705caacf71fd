/*!
 * Entities and localized values.
 *
 * An `Entity` is any content node participating in publication. Its
 * localized fields hold one value per language code; plain attributes hold
 * a single JSON value. The `field_dict` of an entity is what the revision
 * store serializes into snapshots.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Typed (kind, id) key for an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Content type name
    pub kind: String,
    /// Row identifier
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// A mapping from language code to a scalar or file reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedValue(BTreeMap<String, Value>);

impl LocalizedValue {
    /// Create an empty localized value
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a localized value from (language, value) pairs
    pub fn from_pairs<I, L, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<String>,
        V: Into<Value>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(lang, value)| (lang.into(), value.into()))
                .collect(),
        )
    }

    /// Raw value for a language
    pub fn get(&self, language: &str) -> Option<&Value> {
        self.0.get(language)
    }

    /// String value for a language, if the stored value is a string
    pub fn text(&self, language: &str) -> Option<&str> {
        self.0.get(language).and_then(Value::as_str)
    }

    /// Set the value for a language
    pub fn set(&mut self, language: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(language.into(), value.into());
    }

    /// Whether the language holds a usable value (present, not null, not an empty string)
    pub fn is_filled(&self, language: &str) -> bool {
        match self.0.get(language) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Languages that currently have an entry
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        Self(object.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

/// A content node participating in publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// (kind, id) key
    pub reference: EntityRef,
    /// Localized fields by name
    #[serde(default)]
    pub localized: BTreeMap<String, LocalizedValue>,
    /// Non-localized fields by name
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Snapshot currently considered published
    #[serde(default)]
    pub published_version: Option<i64>,
}

impl Entity {
    /// Create an empty, unpublished entity
    pub fn new(reference: EntityRef) -> Self {
        Self {
            reference,
            localized: BTreeMap::new(),
            attributes: BTreeMap::new(),
            published_version: None,
        }
    }

    pub fn kind(&self) -> &str {
        &self.reference.kind
    }

    pub fn id(&self) -> i64 {
        self.reference.id
    }

    /// Localized field by name
    pub fn localized(&self, field: &str) -> Option<&LocalizedValue> {
        self.localized.get(field)
    }

    /// Mutable localized field, created empty when missing
    pub fn localized_mut(&mut self, field: &str) -> &mut LocalizedValue {
        self.localized.entry(field.to_string()).or_default()
    }

    /// Set one language of a localized field
    pub fn set_localized(&mut self, field: &str, language: &str, value: impl Into<Value>) {
        self.localized_mut(field).set(language, value);
    }

    /// Set a non-localized field
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Serialized field values as stored in a snapshot
    ///
    /// `published_version` is never part of the field dict.
    pub fn field_dict(&self) -> Map<String, Value> {
        let mut dict: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in &self.localized {
            dict.insert(name.clone(), value.to_value());
        }
        dict
    }

    /// Merge a field dict into this entity
    ///
    /// Keys listed in `localized_fields` must hold a `{language: value}`
    /// object and are merged language by language; other keys replace the
    /// attribute of the same name.
    pub fn apply_field_dict(&mut self, localized_fields: &[String], data: &Map<String, Value>) {
        for (name, value) in data {
            if localized_fields.iter().any(|f| f == name) {
                if let Value::Object(object) = value {
                    let target = self.localized_mut(name);
                    for (lang, v) in LocalizedValue::from_object(object).0 {
                        target.set(lang, v);
                    }
                    continue;
                }
            }
            self.attributes.insert(name.clone(), value.clone());
        }
    }
}
