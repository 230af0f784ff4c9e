use serde_json::{Map, Value};

use crate::comparison::{compare, values_equal};
use crate::filter::{CompareOp, Filter};
use crate::path::{Element, Path};
use crate::schema::ResourceSchema;

/// Evaluates filters against JSON documents.
///
/// Without a schema every string comparison is case-exact. With one, each
/// attribute's `caseExact` flag decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEvaluator<'s> {
    schema: Option<&'s ResourceSchema>,
}

impl<'s> FilterEvaluator<'s> {
    pub fn new() -> Self {
        Self { schema: None }
    }

    pub fn with_schema(schema: &'s ResourceSchema) -> Self {
        Self {
            schema: Some(schema),
        }
    }

    pub fn matches(&self, filter: &Filter, document: &Value) -> bool {
        self.eval(filter, document, &Path::root())
    }

    /// Evaluate `filter` against one value of the multi-valued attribute
    /// at `scope`. Attribute paths in the filter are relative to the value.
    pub fn matches_element(&self, filter: &Filter, element: &Value, scope: &Path) -> bool {
        self.eval(filter, element, scope)
    }

    fn eval(&self, filter: &Filter, node: &Value, scope: &Path) -> bool {
        match filter {
            Filter::Compare {
                op: CompareOp::Equal,
                path,
                value,
            } => self.equal(path, value, node, scope),
            Filter::Compare {
                op: CompareOp::NotEqual,
                path,
                value,
            } => !self.equal(path, value, node, scope),
            Filter::Compare { op, path, value } => {
                let case_exact = self.case_exact(scope, path);
                self.resolve(path, node, scope)
                    .into_iter()
                    .any(|v| compare(*op, v, value, case_exact))
            }
            Filter::Present(path) => self
                .resolve(path, node, scope)
                .into_iter()
                .any(|v| !v.is_null()),
            Filter::And(terms) => terms.iter().all(|t| self.eval(t, node, scope)),
            Filter::Or(terms) => terms.iter().any(|t| self.eval(t, node, scope)),
            Filter::Not(inner) => !self.eval(inner, node, scope),
            Filter::Complex { path, filter } => {
                let inner_scope = scope.join(path);
                self.resolve(path, node, scope)
                    .into_iter()
                    .any(|v| self.eval(filter, v, &inner_scope))
            }
        }
    }

    /// `eq null` also matches an attribute that is absent.
    fn equal(&self, path: &Path, literal: &Value, node: &Value, scope: &Path) -> bool {
        let values = self.resolve(path, node, scope);
        if literal.is_null() {
            return values.is_empty() || values.iter().any(|v| v.is_null());
        }
        let case_exact = self.case_exact(scope, path);
        values
            .into_iter()
            .any(|v| values_equal(v, literal, case_exact))
    }

    fn case_exact(&self, scope: &Path, path: &Path) -> bool {
        self.schema
            .and_then(|s| s.find(&scope.join(path)))
            .map(|a| a.case_exact)
            .unwrap_or(true)
    }

    /// Every value `path` addresses under `node`, with arrays flattened.
    pub(crate) fn resolve<'v>(&self, path: &Path, node: &'v Value, scope: &Path) -> Vec<&'v Value> {
        if refers_to_self(path, node) {
            return vec![node];
        }
        let mut current: Vec<&'v Value> = vec![node];
        let mut prefix = scope.clone();
        if let Some(urn) = path.schema_urn() {
            current = current.into_iter().filter_map(|n| field(n, urn)).collect();
            prefix = scope.join(&Path::with_schema(urn));
        }
        for element in path.elements() {
            prefix = prefix.sub(element.name());
            current = current
                .into_iter()
                .filter_map(|n| field(n, element.name()))
                .flat_map(flatten)
                .filter(|v| self.select(element, v, &prefix))
                .collect();
        }
        current.into_iter().flat_map(flatten).collect()
    }

    fn select(&self, element: &Element, value: &Value, scope: &Path) -> bool {
        element
            .value_filter()
            .map(|f| self.eval(f, value, scope))
            .unwrap_or(true)
    }
}

/// Inside a value filter over plain values, `value` names the value itself.
fn refers_to_self(path: &Path, node: &Value) -> bool {
    !node.is_object()
        && path.schema_urn().is_none()
        && path.len() == 1
        && path.elements()[0].value_filter().is_none()
        && path.elements()[0].name().eq_ignore_ascii_case("value")
}

fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn field<'v>(node: &'v Value, name: &str) -> Option<&'v Value> {
    node.as_object().and_then(|map| field_in(map, name))
}

/// Exact key first, then a case-insensitive match.
fn field_in<'v>(map: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Evaluate `filter` against `document` without schema information.
pub fn matches(filter: &Filter, document: &Value) -> bool {
    FilterEvaluator::new().matches(filter, document)
}
