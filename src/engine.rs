//! Addressing and in-place mutation of schemaless JSON documents.
//!
//! A [`Path`] is walked structurally: a leading schema URN selects the
//! extension object stored under that key at the document root, plain
//! elements descend into object fields (or into every object of an array),
//! and an element with a value filter selects the matching values of an
//! array. Field names match exactly first, then case-insensitively.
//!
//! Mutations are applied in place with no rollback. Callers needing
//! all-or-nothing semantics should mutate a clone and swap it in on success.

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Result, ScimError};
use crate::evaluator::FilterEvaluator;
use crate::filter::Filter;
use crate::path::{Element, Path};
use crate::schema::ResourceSchema;

/// Applies paths to documents; value filters are evaluated with the wrapped
/// [`FilterEvaluator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentEngine<'s> {
    evaluator: FilterEvaluator<'s>,
}

impl<'s> DocumentEngine<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: &'s ResourceSchema) -> Self {
        Self {
            evaluator: FilterEvaluator::with_schema(schema),
        }
    }

    pub fn evaluator(&self) -> &FilterEvaluator<'s> {
        &self.evaluator
    }

    /// Every node `path` addresses, with multi-valued attributes flattened.
    /// The root path addresses the document itself.
    pub fn find_values<'v>(&self, path: &Path, document: &'v Value) -> Vec<&'v Value> {
        if path.is_document_root() {
            return vec![document];
        }
        self.evaluator.resolve(path, document, &Path::root())
    }

    /// Add `value` at `path`, creating missing objects on the way.
    ///
    /// Arrays gain the values they do not already hold, objects are merged,
    /// anything else is set. Returns how many nodes were written; zero means
    /// a value filter matched nothing.
    pub fn add_value(&self, path: &Path, document: &mut Value, value: Value) -> Result<usize> {
        if path.is_root() && !value.is_object() {
            return Err(ScimError::InvalidValue(
                "a value added without a path must be a JSON object".into(),
            ));
        }
        let doc = object_mut(document)?;
        let urn = path.schema_urn();
        let written = {
            let ns = namespace(doc, urn, true)?
                .ok_or_else(|| ScimError::InvalidPath(path.to_string()))?;
            match (path.is_root(), value) {
                (true, Value::Object(fields)) => {
                    for (name, v) in fields {
                        let key = key_for(ns, &name);
                        merge_add(ns, key, v);
                    }
                    1
                }
                (_, value) => self.add_at(ns, path.elements(), &scope_of(path), value)?,
            }
        };
        prune_namespace(doc, urn);
        if written == 0 {
            debug!(path = %path, "add matched no values; nothing changed");
        }
        Ok(written)
    }

    /// Replace the value at `path`.
    ///
    /// Without a value filter on the last element an empty array deletes
    /// the attribute. With one, the matching values are replaced wholesale
    /// (or removed, for an empty array) and matching nothing is
    /// [`ScimError::NoTarget`].
    pub fn replace_value(&self, path: &Path, document: &mut Value, value: Value) -> Result<usize> {
        if path.is_root() && !value.is_object() {
            return Err(ScimError::InvalidValue(
                "a replacement without a path must be a JSON object".into(),
            ));
        }
        let doc = object_mut(document)?;
        let urn = path.schema_urn();
        let written = {
            let ns = namespace(doc, urn, true)?
                .ok_or_else(|| ScimError::InvalidPath(path.to_string()))?;
            match (path.is_root(), value) {
                (true, Value::Object(fields)) => {
                    for (name, v) in fields {
                        let key = key_for(ns, &name);
                        set_field(ns, key, v);
                    }
                    1
                }
                (_, value) => self.replace_at(ns, path.elements(), &scope_of(path), value)?,
            }
        };
        prune_namespace(doc, urn);
        Ok(written)
    }

    /// Remove every value `path` addresses and return them.
    ///
    /// Removing the last value of an array removes the attribute; removing
    /// the last attribute of an extension removes the extension object.
    /// Removing nothing is [`ScimError::NoTarget`], so a repeated removal
    /// reports instead of silently succeeding.
    pub fn remove_values(&self, path: &Path, document: &mut Value) -> Result<Vec<Value>> {
        let doc = object_mut(document)?;
        let urn = path.schema_urn();
        if path.is_root() {
            let Some(urn) = urn else {
                return Err(ScimError::InvalidPath("the document root cannot be removed".into()));
            };
            let key = key_for(doc, urn);
            return match doc.remove(&key) {
                Some(v) => Ok(vec![v]),
                None => Err(ScimError::NoTarget(path.to_string())),
            };
        }
        let removed = match namespace(doc, urn, false)? {
            Some(ns) => self.remove_at(ns, path.elements(), &scope_of(path))?,
            None => Vec::new(),
        };
        prune_namespace(doc, urn);
        if removed.is_empty() {
            debug!(path = %path, "remove matched nothing");
            return Err(ScimError::NoTarget(path.to_string()));
        }
        Ok(removed)
    }

    fn add_at(&self, map: &mut Map<String, Value>, elements: &[Element], scope: &Path, value: Value) -> Result<usize> {
        let Some((head, rest)) = elements.split_first() else {
            return Ok(0);
        };
        let scope = scope.sub(head.name());
        let key = key_for(map, head.name());

        let Some(filter) = head.value_filter() else {
            if rest.is_empty() {
                merge_add(map, key, value);
                return Ok(1);
            }
            return write_below(map, key, &scope, |inner| {
                self.add_at(inner, rest, &scope, value.clone())
            });
        };

        let items = match map.get_mut(&key) {
            None | Some(Value::Null) => return Ok(0),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(not_multi_valued(&scope)),
        };
        let mut written = 0;
        for item in items.iter_mut() {
            if !self.evaluator.matches_element(filter, item, &scope) {
                continue;
            }
            match (item, rest.is_empty()) {
                (Value::Object(inner), true) => {
                    let Value::Object(fields) = value.clone() else {
                        return Err(ScimError::InvalidValue(format!(
                            "values added to {scope} through a filter must be JSON objects"
                        )));
                    };
                    for (name, v) in fields {
                        let key = key_for(inner, &name);
                        merge_add(inner, key, v);
                    }
                }
                (Value::Object(inner), false) => {
                    self.add_at(inner, rest, &scope, value.clone())?;
                }
                (_, _) => return Err(not_complex(&scope)),
            }
            written += 1;
        }
        Ok(written)
    }

    fn replace_at(&self, map: &mut Map<String, Value>, elements: &[Element], scope: &Path, value: Value) -> Result<usize> {
        let Some((head, rest)) = elements.split_first() else {
            return Ok(0);
        };
        let scope = scope.sub(head.name());
        let key = key_for(map, head.name());

        let Some(filter) = head.value_filter() else {
            if rest.is_empty() {
                return Ok(usize::from(set_field(map, key, value)));
            }
            return write_below(map, key, &scope, |inner| {
                self.replace_at(inner, rest, &scope, value.clone())
            });
        };

        let items = match map.get_mut(&key) {
            None | Some(Value::Null) => return Err(no_match(&scope, filter)),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(not_multi_valued(&scope)),
        };

        let written = if rest.is_empty() && is_empty_array(&value) {
            let before = items.len();
            items.retain(|item| !self.evaluator.matches_element(filter, item, &scope));
            let removed = before - items.len();
            if removed > 0 && items.is_empty() {
                map.remove(&key);
            }
            removed
        } else if rest.is_empty() {
            if value.is_array() {
                return Err(ScimError::InvalidValue(format!(
                    "values of {scope} selected by a filter cannot be replaced by an array"
                )));
            }
            let mut written = 0;
            for item in items.iter_mut() {
                if self.evaluator.matches_element(filter, item, &scope) {
                    *item = value.clone();
                    written += 1;
                }
            }
            written
        } else {
            let mut written = 0;
            for item in items.iter_mut() {
                if !self.evaluator.matches_element(filter, item, &scope) {
                    continue;
                }
                let Value::Object(inner) = item else {
                    return Err(not_complex(&scope));
                };
                self.replace_at(inner, rest, &scope, value.clone())?;
                written += 1;
            }
            written
        };

        if written == 0 {
            return Err(no_match(&scope, filter));
        }
        Ok(written)
    }

    fn remove_at(&self, map: &mut Map<String, Value>, elements: &[Element], scope: &Path) -> Result<Vec<Value>> {
        let Some((head, rest)) = elements.split_first() else {
            return Ok(Vec::new());
        };
        let scope = scope.sub(head.name());
        let key = key_for(map, head.name());

        let Some(filter) = head.value_filter() else {
            if rest.is_empty() {
                return Ok(map.remove(&key).into_iter().collect());
            }
            return match map.get_mut(&key) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Object(inner)) => self.remove_at(inner, rest, &scope),
                Some(Value::Array(items)) => {
                    let mut removed = Vec::new();
                    for inner in objects_mut(items, &scope)? {
                        removed.extend(self.remove_at(inner, rest, &scope)?);
                    }
                    Ok(removed)
                }
                Some(_) => Err(not_complex(&scope)),
            };
        };

        let items = match map.get_mut(&key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(not_multi_valued(&scope)),
        };

        if rest.is_empty() {
            let (removed, kept): (Vec<Value>, Vec<Value>) = std::mem::take(items)
                .into_iter()
                .partition(|item| self.evaluator.matches_element(filter, item, &scope));
            if kept.is_empty() && !removed.is_empty() {
                map.remove(&key);
            } else {
                *items = kept;
            }
            return Ok(removed);
        }

        let mut removed = Vec::new();
        for item in items.iter_mut() {
            if !self.evaluator.matches_element(filter, item, &scope) {
                continue;
            }
            let Value::Object(inner) = item else {
                return Err(not_complex(&scope));
            };
            removed.extend(self.remove_at(inner, rest, &scope)?);
        }
        Ok(removed)
    }
}

/// [`DocumentEngine::find_values`] without schema information.
pub fn find_values<'v>(path: &Path, document: &'v Value) -> Vec<&'v Value> {
    DocumentEngine::new().find_values(path, document)
}

/// [`DocumentEngine::add_value`] without schema information.
pub fn add_value(path: &Path, document: &mut Value, value: Value) -> Result<usize> {
    DocumentEngine::new().add_value(path, document, value)
}

/// [`DocumentEngine::replace_value`] without schema information.
pub fn replace_value(path: &Path, document: &mut Value, value: Value) -> Result<usize> {
    DocumentEngine::new().replace_value(path, document, value)
}

/// [`DocumentEngine::remove_values`] without schema information.
pub fn remove_values(path: &Path, document: &mut Value) -> Result<Vec<Value>> {
    DocumentEngine::new().remove_values(path, document)
}

fn object_mut(document: &mut Value) -> Result<&mut Map<String, Value>> {
    document
        .as_object_mut()
        .ok_or_else(|| ScimError::InvalidValue("the document must be a JSON object".into()))
}

/// The object holding `urn`'s attributes, or the document itself.
fn namespace<'d>(
    doc: &'d mut Map<String, Value>,
    urn: Option<&str>,
    create: bool,
) -> Result<Option<&'d mut Map<String, Value>>> {
    let Some(urn) = urn else {
        return Ok(Some(doc));
    };
    let key = key_for(doc, urn);
    if !doc.contains_key(&key) {
        if !create {
            return Ok(None);
        }
        doc.insert(key.clone(), Value::Object(Map::new()));
    }
    match doc.get_mut(&key) {
        Some(Value::Object(ns)) => Ok(Some(ns)),
        _ => Err(ScimError::InvalidPath(format!("{urn} is not a JSON object"))),
    }
}

fn prune_namespace(doc: &mut Map<String, Value>, urn: Option<&str>) {
    let Some(urn) = urn else { return };
    let key = key_for(doc, urn);
    if matches!(doc.get(&key), Some(Value::Object(ns)) if ns.is_empty()) {
        doc.remove(&key);
    }
}

/// The existing key that matches `name`, or `name` itself.
fn key_for(map: &Map<String, Value>, name: &str) -> String {
    if map.contains_key(name) {
        return name.to_string();
    }
    map.keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

fn scope_of(path: &Path) -> Path {
    match path.schema_urn() {
        Some(urn) => Path::with_schema(urn),
        None => Path::root(),
    }
}

fn is_empty_array(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.is_empty())
}

/// Set `key`, except that an empty array deletes it. Returns whether the
/// map changed.
fn set_field(map: &mut Map<String, Value>, key: String, value: Value) -> bool {
    if is_empty_array(&value) {
        return map.remove(&key).is_some();
    }
    map.insert(key, value);
    true
}

fn merge_add(map: &mut Map<String, Value>, key: String, value: Value) {
    let Some(slot) = map.get_mut(&key) else {
        map.insert(key, value);
        return;
    };
    match (slot, value) {
        (Value::Array(existing), value) => {
            let incoming = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            for v in incoming {
                if !existing.contains(&v) {
                    existing.push(v);
                }
            }
        }
        (Value::Object(existing), Value::Object(fields)) => {
            for (name, v) in fields {
                let key = key_for(existing, &name);
                merge_add(existing, key, v);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `write` to the object at `key`, or to every object of the array
/// at `key`. An absent or null `key` gets a new object, which is taken back
/// out when nothing was written into it.
fn write_below<F>(map: &mut Map<String, Value>, key: String, scope: &Path, mut write: F) -> Result<usize>
where
    F: FnMut(&mut Map<String, Value>) -> Result<usize>,
{
    let was_null = match map.get(&key) {
        None => Some(false),
        Some(Value::Null) => Some(true),
        Some(_) => None,
    };
    let child = map.entry(key.clone()).or_insert(Value::Null);
    if child.is_null() {
        *child = Value::Object(Map::new());
    }
    let written = match child {
        Value::Object(inner) => write(inner),
        Value::Array(items) => objects_mut(items, scope)
            .and_then(|inners| inners.into_iter().map(&mut write).sum::<Result<usize>>()),
        _ => Err(not_complex(scope)),
    };
    let Some(was_null) = was_null else {
        return written;
    };
    if matches!(map.get(&key), Some(Value::Object(inner)) if inner.is_empty()) {
        if was_null {
            map.insert(key, Value::Null);
        } else {
            map.remove(&key);
        }
    }
    written
}

fn objects_mut<'a>(items: &'a mut [Value], scope: &Path) -> Result<Vec<&'a mut Map<String, Value>>> {
    items
        .iter_mut()
        .map(|item| match item {
            Value::Object(inner) => Ok(inner),
            _ => Err(not_complex(scope)),
        })
        .collect()
}

fn not_complex(scope: &Path) -> ScimError {
    ScimError::InvalidPath(format!("{scope} does not hold complex values"))
}

fn not_multi_valued(scope: &Path) -> ScimError {
    ScimError::InvalidPath(format!(
        "a value filter was applied to {scope}, which is not multi-valued"
    ))
}

fn no_match(scope: &Path, filter: &Filter) -> ScimError {
    ScimError::NoTarget(format!("no values of {scope} match {filter}"))
}
