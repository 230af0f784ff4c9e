//! SCIM PATCH requests.
//!
//! Operations apply in order to the same document, in place. The first
//! failing operation aborts the request and earlier operations stay applied;
//! use [`PatchRequest::apply_atomically`] when that is not acceptable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::{ParserOptions, PatchOptions};
use crate::engine::DocumentEngine;
use crate::errors::{Result, ScimError};
use crate::filter::Filter;
use crate::path::Path;

pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOperation", into = "RawOperation")]
pub enum PatchOperation {
    Add { path: Option<Path>, value: Value },
    Remove { path: Path },
    Replace { path: Option<Path>, value: Value },
}

impl PatchOperation {
    /// An add; without a path `value` must be an object merged into the root.
    pub fn add(path: Option<Path>, value: Value) -> Result<Self> {
        check_root_value("add", path.as_ref(), &value)?;
        Ok(PatchOperation::Add { path, value })
    }

    pub fn remove(path: Path) -> Self {
        PatchOperation::Remove { path }
    }

    /// A replace; without a path each field of the object `value` replaces
    /// the field of the same name.
    pub fn replace(path: Option<Path>, value: Value) -> Result<Self> {
        check_root_value("replace", path.as_ref(), &value)?;
        Ok(PatchOperation::Replace { path, value })
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            PatchOperation::Add { path, .. } | PatchOperation::Replace { path, .. } => path.as_ref(),
            PatchOperation::Remove { path } => Some(path),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. } => Some(value),
            PatchOperation::Remove { .. } => None,
        }
    }

    /// Apply this operation alone.
    pub fn apply(&self, document: &mut Value, engine: &DocumentEngine<'_>, opts: &PatchOptions) -> Result<()> {
        let root = Path::root();
        match self {
            PatchOperation::Add { path, value } => {
                engine.add_value(path.as_ref().unwrap_or(&root), document, value.clone())?;
            }
            PatchOperation::Replace { path, value } => {
                engine.replace_value(path.as_ref().unwrap_or(&root), document, value.clone())?;
            }
            PatchOperation::Remove { path } => {
                engine.remove_values(path, document)?;
            }
        }
        if opts.update_schemas {
            self.register_extensions(document);
        }
        Ok(())
    }

    /// Append written extension URNs to an existing `schemas` array.
    fn register_extensions(&self, document: &mut Value) {
        let mut urns: Vec<String> = Vec::new();
        match self {
            PatchOperation::Remove { .. } => return,
            PatchOperation::Add { path, value } | PatchOperation::Replace { path, value } => {
                match path.as_ref().and_then(Path::schema_urn) {
                    Some(urn) => urns.push(urn.to_string()),
                    None if path.as_ref().map(Path::is_document_root).unwrap_or(true) => {
                        if let Value::Object(fields) = value {
                            urns.extend(
                                fields
                                    .iter()
                                    .filter(|(k, v)| is_urn(k) && v.is_object())
                                    .map(|(k, _)| k.clone()),
                            );
                        }
                    }
                    None => {}
                }
            }
        }
        // Pruned namespaces are not registered.
        urns.retain(|urn| {
            document
                .as_object()
                .map(|m| m.keys().any(|k| k.eq_ignore_ascii_case(urn)))
                .unwrap_or(false)
        });
        let Some(Value::Array(schemas)) = document.get_mut("schemas") else {
            return;
        };
        for urn in urns {
            let present = schemas
                .iter()
                .any(|s| s.as_str().map(|s| s.eq_ignore_ascii_case(&urn)).unwrap_or(false));
            if !present {
                schemas.push(Value::String(urn));
            }
        }
    }
}

fn is_urn(key: &str) -> bool {
    key.len() > 4
        && key
            .get(..4)
            .map(|p| p.eq_ignore_ascii_case("urn:"))
            .unwrap_or(false)
}

fn check_root_value(op: &str, path: Option<&Path>, value: &Value) -> Result<()> {
    let at_root = path.map(Path::is_root).unwrap_or(true);
    if at_root && !value.is_object() {
        return Err(ScimError::InvalidPatch(format!(
            "{op} without an attribute path requires a JSON object value"
        )));
    }
    Ok(())
}

/// Wire form of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawOperation {
    op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl RawOperation {
    fn into_operation(self, opts: &ParserOptions) -> Result<PatchOperation> {
        let path = match self.path.as_deref() {
            None => None,
            Some(p) => Some(Path::parse(p, opts)?),
        };
        match self.op.to_ascii_lowercase().as_str() {
            "add" => {
                let value = self
                    .value
                    .ok_or_else(|| ScimError::InvalidPatch("add requires a value".into()))?;
                PatchOperation::add(path, value)
            }
            "replace" => {
                let value = self
                    .value
                    .ok_or_else(|| ScimError::InvalidPatch("replace requires a value".into()))?;
                PatchOperation::replace(path, value)
            }
            "remove" => {
                let path = path
                    .ok_or_else(|| ScimError::InvalidPatch("remove requires a path".into()))?;
                match self.value {
                    None | Some(Value::Null) => Ok(PatchOperation::remove(path)),
                    Some(value) => Ok(PatchOperation::remove(removal_path(path, &value)?)),
                }
            }
            other => Err(ScimError::InvalidPatch(format!("unknown operation {other:?}"))),
        }
    }
}

/// Some clients send `{"op": "remove", "path": "members", "value": [{"value": "id"}]}`
/// to remove selected values. Turn the listed values into a value filter on
/// the last path element.
fn removal_path(path: Path, value: &Value) -> Result<Path> {
    let invalid = || ScimError::InvalidPatch(format!("cannot remove the given values from {path}"));
    let last = path.last().ok_or_else(invalid)?;
    if last.value_filter().is_some() {
        return Err(invalid());
    }
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut selector: Option<Filter> = None;
    for item in items {
        let term = match item {
            Value::Object(fields) => fields
                .iter()
                .filter(|(_, v)| !v.is_array() && !v.is_object())
                .map(|(k, v)| Filter::eq(Path::attribute(k.clone()), v.clone()))
                .reduce(Filter::and)
                .ok_or_else(invalid)?,
            Value::Array(_) => return Err(invalid()),
            scalar => Filter::eq(Path::attribute("value"), scalar.clone()),
        };
        selector = Some(match selector {
            None => term,
            Some(prev) => Filter::or(prev, term),
        });
    }
    let selector = selector.ok_or_else(invalid)?;
    let name = last.name().to_string();
    let parent = path.parent().ok_or_else(invalid)?;
    Ok(parent.sub_filtered(name, selector))
}

impl TryFrom<RawOperation> for PatchOperation {
    type Error = ScimError;

    fn try_from(raw: RawOperation) -> Result<Self> {
        raw.into_operation(&ParserOptions::default())
    }
}

impl From<PatchOperation> for RawOperation {
    fn from(op: PatchOperation) -> Self {
        let op_name = op.op_name().to_string();
        let (path, value) = match op {
            PatchOperation::Add { path, value } | PatchOperation::Replace { path, value } => (path, Some(value)),
            PatchOperation::Remove { path } => (Some(path), None),
        };
        RawOperation {
            op: op_name,
            path: path.map(|p| p.to_string()),
            value,
        }
    }
}

fn default_schemas() -> Vec<String> {
    vec![PATCH_OP_SCHEMA.to_string()]
}

/// An ordered list of patch operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRequest {
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations", alias = "operations")]
    pub operations: Vec<PatchOperation>,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default = "default_schemas")]
    schemas: Vec<String>,
    #[serde(rename = "Operations", alias = "operations")]
    operations: Vec<RawOperation>,
}

impl PatchRequest {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            schemas: default_schemas(),
            operations,
        }
    }

    /// Parse a request body, reading paths with `opts`.
    pub fn parse(json: &str, opts: &ParserOptions) -> Result<Self> {
        let raw: RawRequest = serde_json::from_str(json)?;
        let operations = raw
            .operations
            .into_iter()
            .enumerate()
            .map(|(index, op)| {
                let path = op.path.clone().unwrap_or_default();
                let name = op_label(&op.op);
                op.into_operation(opts).map_err(|e| ScimError::Operation {
                    index,
                    op: name,
                    path,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schemas: raw.schemas,
            operations,
        })
    }

    /// Apply every operation in order with default options.
    pub fn apply(&self, document: &mut Value) -> Result<()> {
        self.apply_with(document, &DocumentEngine::new(), &PatchOptions::default())
    }

    /// Apply every operation in order. Stops at the first failure, which is
    /// wrapped in [`ScimError::Operation`]; earlier operations stay applied.
    pub fn apply_with(&self, document: &mut Value, engine: &DocumentEngine<'_>, opts: &PatchOptions) -> Result<()> {
        for (index, op) in self.operations.iter().enumerate() {
            let path = op.path().map(Path::to_string).unwrap_or_default();
            debug!(index, op = op.op_name(), path = %path, "applying patch operation");
            match op.apply(document, engine, opts) {
                Ok(()) => {}
                Err(e) if opts.ignore_no_target && e.is_no_target() => {
                    debug!(index, path = %path, "operation matched nothing; skipped");
                }
                Err(e) => {
                    return Err(ScimError::Operation {
                        index,
                        op: op.op_name(),
                        path,
                        source: Box::new(e),
                    })
                }
            }
        }
        Ok(())
    }

    /// Apply to a copy and replace `document` only if every operation succeeds.
    pub fn apply_atomically(&self, document: &mut Value, engine: &DocumentEngine<'_>, opts: &PatchOptions) -> Result<()> {
        let mut copy = document.clone();
        self.apply_with(&mut copy, engine, opts)?;
        *document = copy;
        Ok(())
    }
}

fn op_label(op: &str) -> &'static str {
    match op.to_ascii_lowercase().as_str() {
        "add" => "add",
        "remove" => "remove",
        "replace" => "replace",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn op_names_are_case_insensitive() {
        let req: PatchRequest = serde_json::from_value(json!({
            "schemas": [PATCH_OP_SCHEMA],
            "Operations": [
                {"op": "Add", "path": "nickName", "value": "Babs"},
                {"op": "REPLACE", "path": "active", "value": false},
                {"op": "remove", "path": "title"}
            ]
        }))
        .unwrap();
        let names: Vec<_> = req.operations.iter().map(PatchOperation::op_name).collect();
        assert_eq!(names, vec!["add", "replace", "remove"]);
    }

    #[test]
    fn remove_without_path_is_rejected_at_parse_time() {
        let err = PatchRequest::parse(
            r#"{"Operations": [{"op": "add", "path": "a", "value": 1}, {"op": "remove"}]}"#,
            &ParserOptions::default(),
        )
        .unwrap_err();
        match err {
            ScimError::Operation { index, op, .. } => {
                assert_eq!(index, 1);
                assert_eq!(op, "remove");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn root_add_requires_object() {
        assert!(PatchOperation::add(None, json!("x")).is_err());
        assert!(PatchOperation::replace(Some(Path::root()), json!([1])).is_err());
        assert!(PatchOperation::add(None, json!({"a": 1})).is_ok());
    }

    #[test]
    fn serializes_lowercase_ops_and_string_paths() {
        let req = PatchRequest::new(vec![
            PatchOperation::remove(r#"emails[type eq "work"]"#.parse().unwrap()),
            PatchOperation::add(Some(Path::attribute("nickName")), json!("B")).unwrap(),
        ]);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "schemas": [PATCH_OP_SCHEMA],
                "Operations": [
                    {"op": "remove", "path": "emails[type eq \"work\"]"},
                    {"op": "add", "path": "nickName", "value": "B"}
                ]
            })
        );
    }

    #[test]
    fn remove_with_value_list_selects_those_values() {
        let op: PatchOperation = serde_json::from_value(json!({
            "op": "Remove",
            "path": "members",
            "value": [{"value": "a"}, {"value": "b"}]
        }))
        .unwrap();
        assert_eq!(
            op.path().unwrap().to_string(),
            r#"members[value eq "a" or value eq "b"]"#
        );
    }

    #[test]
    fn sequential_application() {
        let mut doc = json!({"a": 0});
        let req = PatchRequest::new(vec![
            PatchOperation::remove(Path::attribute("a")),
            PatchOperation::add(Some(Path::attribute("a")), json!(1)).unwrap(),
        ]);
        req.apply(&mut doc).unwrap();
        assert_eq!(doc, json!({"a": 1}));
    }
}
