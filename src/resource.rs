use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::engine::DocumentEngine;
use crate::errors::{Result, ScimError};
use crate::evaluator::FilterEvaluator;
use crate::filter::Filter;
use crate::patch::PatchRequest;
use crate::path::Path;

/// A SCIM resource held as a schemaless JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GenericResource(Value);

impl Default for GenericResource {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericResource {
    /// An empty resource.
    pub fn new() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Wrap `value`, which must be a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ScimError::InvalidValue("a resource must be a JSON object".into()));
        }
        Ok(Self(value))
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// The string entries of the `schemas` attribute.
    pub fn schemas(&self) -> Vec<&str> {
        self.0
            .get("schemas")
            .and_then(Value::as_array)
            .map(|urns| urns.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn get_values(&self, path: &Path) -> Vec<&Value> {
        DocumentEngine::new().find_values(path, &self.0)
    }

    /// The first value `path` addresses.
    pub fn get_value(&self, path: &Path) -> Option<&Value> {
        self.get_values(path).into_iter().next()
    }

    pub fn add_value(&mut self, path: &Path, value: Value) -> Result<usize> {
        DocumentEngine::new().add_value(path, &mut self.0, value)
    }

    pub fn replace_value(&mut self, path: &Path, value: Value) -> Result<usize> {
        DocumentEngine::new().replace_value(path, &mut self.0, value)
    }

    pub fn remove_values(&mut self, path: &Path) -> Result<Vec<Value>> {
        DocumentEngine::new().remove_values(path, &mut self.0)
    }

    pub fn matches(&self, filter: &Filter) -> bool {
        FilterEvaluator::new().matches(filter, &self.0)
    }

    /// Apply `request`; on failure the resource is left unchanged.
    pub fn apply_patch(&mut self, request: &PatchRequest) -> Result<()> {
        request.apply_atomically(&mut self.0, &DocumentEngine::new(), &Default::default())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl TryFrom<Value> for GenericResource {
    type Error = ScimError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<GenericResource> for Value {
    fn from(resource: GenericResource) -> Self {
        resource.0
    }
}

impl<'de> Deserialize<'de> for GenericResource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn rejects_non_objects() {
        assert!(GenericResource::from_value(json!([1])).is_err());
        assert!(serde_json::from_str::<GenericResource>("\"x\"").is_err());
    }

    #[test]
    fn reads_id_and_schemas() {
        let res = GenericResource::from_value(json!({
            "id": "2819c223",
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User", 7]
        }))
        .unwrap();
        assert_eq!(res.id(), Some("2819c223"));
        assert_eq!(res.schemas(), vec!["urn:ietf:params:scim:schemas:core:2.0:User"]);
        assert_eq!(GenericResource::new().id(), None);
    }

    #[test]
    fn failed_patch_leaves_resource_unchanged() {
        let mut res = GenericResource::from_value(json!({"a": 1})).unwrap();
        let req = PatchRequest::parse(
            r#"{"Operations": [
                {"op": "replace", "path": "a", "value": 2},
                {"op": "remove", "path": "missing"}
            ]}"#,
            &Default::default(),
        )
        .unwrap();
        assert!(res.apply_patch(&req).is_err());
        assert_eq!(res.as_value(), &json!({"a": 1}));
    }
}
