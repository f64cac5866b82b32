//! NIP-01 REQ filters.
//!
//! Filters travel as JSON objects where single-letter tag constraints are
//! spelled `#e`, `#p`, ... The struct keeps those under `tags` keyed by the
//! bare letter.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{error::NostrError, event::Event};

const MAX_FILTER_VALUES: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
    pub kinds: Option<Vec<u16>>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.get_or_insert_with(Vec::new).push(id.into());
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ids.get_or_insert_with(Vec::new).extend(ids);
        self
    }

    pub fn author(mut self, pubkey: impl Into<String>) -> Self {
        self.authors.get_or_insert_with(Vec::new).push(pubkey.into());
        self
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a `#<name>` tag constraint.
    pub fn tag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.tags.entry(name.to_owned()).or_default().push(value.into());
        self
    }

    pub fn tag_values(&self, name: &str) -> &[String] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn wants_kind(&self, kind: u16) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    /// Local evaluation of the filter against an event.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| event.id.starts_with(id.as_str())) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.iter().any(|author| event.pubkey.starts_with(author.as_str())) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        for (tag, values) in &self.tags {
            let event_values = event.tag_values(tag);
            if !values.iter().any(|value| event_values.contains(&value.as_str())) {
                return false;
            }
        }
        true
    }

    /// Parse a filter from its wire JSON object.
    pub fn from_value(value: &Value) -> Result<Self, NostrError> {
        let map = value
            .as_object()
            .ok_or_else(|| NostrError::MalformedFilter("filter must be an object".into()))?;

        let mut filter = Filter {
            ids: string_list(map.get("ids"))?,
            authors: string_list(map.get("authors"))?,
            kinds: kind_list(map.get("kinds"))?,
            since: map.get("since").and_then(Value::as_i64),
            until: map.get("until").and_then(Value::as_i64),
            limit: map.get("limit").and_then(Value::as_u64).map(|l| l as usize),
            tags: BTreeMap::new(),
        };

        for (key, value) in map {
            let Some(name) = key.strip_prefix('#') else { continue };
            let values = string_list(Some(value))?.unwrap_or_default();
            filter.tags.insert(name.to_owned(), values);
        }
        Ok(filter)
    }

    /// Render the wire JSON object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(ids) = &self.ids {
            map.insert("ids".into(), Value::from(ids.clone()));
        }
        if let Some(authors) = &self.authors {
            map.insert("authors".into(), Value::from(authors.clone()));
        }
        if let Some(kinds) = &self.kinds {
            map.insert("kinds".into(), Value::from(kinds.clone()));
        }
        if let Some(since) = self.since {
            map.insert("since".into(), since.into());
        }
        if let Some(until) = self.until {
            map.insert("until".into(), until.into());
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), limit.into());
        }
        for (name, values) in &self.tags {
            map.insert(format!("#{name}"), Value::from(values.clone()));
        }
        Value::Object(map)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Filter::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn string_list(value: Option<&Value>) -> Result<Option<Vec<String>>, NostrError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let list: Vec<String> = value
        .as_array()
        .ok_or_else(|| NostrError::MalformedFilter("expected array".into()))?
        .iter()
        .filter_map(|item| item.as_str().map(str::to_owned))
        .collect();
    if list.len() > MAX_FILTER_VALUES {
        return Err(NostrError::MalformedFilter("too many filter values".into()));
    }
    Ok(Some(list))
}

fn kind_list(value: Option<&Value>) -> Result<Option<Vec<u16>>, NostrError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let list: Vec<u16> = value
        .as_array()
        .ok_or_else(|| NostrError::MalformedFilter("expected array".into()))?
        .iter()
        .filter_map(|item| item.as_u64().and_then(|v| u16::try_from(v).ok()))
        .collect();
    Ok(Some(list))
}
