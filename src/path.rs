use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::ParserOptions;
use crate::errors::ParseError;
use crate::filter::{self, Filter};
use crate::parser::Parser;

/// One attribute step of a [`Path`], optionally narrowed by a value filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    filter: Option<Filter>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
        }
    }

    pub fn filtered(name: impl Into<String>, filter: Filter) -> Self {
        Self {
            name: name.into(),
            filter: Some(filter),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(filter) = &self.filter {
            write!(f, "[{filter}]")?;
        }
        Ok(())
    }
}

/// An attribute path such as `name.familyName`, `emails[type eq "work"].value`
/// or `urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value`.
///
/// The empty path is the document root. Paths are immutable; the builder
/// methods return new paths. Builder methods do not validate attribute
/// names, only [`Path::parse`] does.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    schema_urn: Option<String>,
    elements: Vec<Element>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// The root of an extension namespace.
    pub fn with_schema(urn: impl Into<String>) -> Self {
        Self {
            schema_urn: Some(urn.into()),
            elements: Vec::new(),
        }
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self::root().sub(name)
    }

    pub fn sub(&self, name: impl Into<String>) -> Self {
        let mut out = self.clone();
        out.elements.push(Element::new(name));
        out
    }

    pub fn sub_filtered(&self, name: impl Into<String>, filter: Filter) -> Self {
        let mut out = self.clone();
        out.elements.push(Element::filtered(name, filter));
        out
    }

    /// Parse `input` with the given options.
    pub fn parse(input: &str, opts: &ParserOptions) -> Result<Self, ParseError> {
        parse_path(input, opts)
    }

    /// Append `other`'s elements. `other`'s schema URN is used only when
    /// `self` has none.
    pub fn join(&self, other: &Path) -> Self {
        let mut out = self.clone();
        if out.schema_urn.is_none() && out.elements.is_empty() {
            out.schema_urn = other.schema_urn.clone();
        }
        out.elements.extend(other.elements.iter().cloned());
        out
    }

    /// The path without its last element, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.elements.is_empty() {
            return None;
        }
        let mut out = self.clone();
        out.elements.pop();
        Some(out)
    }

    pub fn without_filters(&self) -> Self {
        Self {
            schema_urn: self.schema_urn.clone(),
            elements: self
                .elements
                .iter()
                .map(|e| Element::new(e.name.clone()))
                .collect(),
        }
    }

    pub fn schema_urn(&self) -> Option<&str> {
        self.schema_urn.as_deref()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn last(&self) -> Option<&Element> {
        self.elements.last()
    }

    /// True when the path has no attribute elements, so it addresses a
    /// whole object: the document, or an extension's object for an
    /// extension root such as `urn:...:User:`.
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// True only for the path that addresses the document itself: no schema
    /// URN and no elements. Unlike [`Path::is_root`] this is false for an
    /// extension root.
    pub fn is_document_root(&self) -> bool {
        self.schema_urn.is_none() && self.elements.is_empty()
    }

    /// Number of attribute elements. The schema URN is not counted.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn has_filters(&self) -> bool {
        self.elements.iter().any(|e| e.filter.is_some())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(urn) = &self.schema_urn {
            write!(f, "{urn}:")?;
        }
        write!(f, "{}", self.elements.iter().join("."))
    }
}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s, &ParserOptions::default())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a SCIM attribute path.
///
/// ```text
/// PATH     := (URN ":")? SEGMENT ("." SEGMENT)*
/// SEGMENT  := ATTRNAME ("[" FILTER "]")?
/// ```
///
/// The empty string is the root path.
pub fn parse_path(input: &str, opts: &ParserOptions) -> Result<Path, ParseError> {
    tracing::trace!(input, "parsing path");
    if input.is_empty() {
        return Ok(Path::root());
    }

    let (schema_urn, start) = split_schema_urn(input)?;
    let mut path = Path {
        schema_urn,
        elements: Vec::new(),
    };
    if start == input.len() {
        return Ok(path);
    }

    let mut p = Parser::with_base(&input[start..], start);
    loop {
        let name_start = p.pos();
        let name = p.take_while(|c| c != '.' && c != '[');
        if name.is_empty() {
            return Err(ParseError::path(input, name_start, "expected an attribute name"));
        }
        if let Some((off, c)) = name.char_indices().find(|(_, c)| !opts.is_attribute_char(*c)) {
            return Err(ParseError::path(
                input,
                name_start + off,
                format!("invalid character {c:?} in attribute name"),
            ));
        }

        let filter = if p.peek_char() == Some('[') {
            let open = p.pos();
            let inner = p
                .take_bracketed()
                .map_err(|off| ParseError::path(input, off, "unterminated value filter"))?;
            if inner.trim().is_empty() {
                return Err(ParseError::path(input, open, "empty value filter"));
            }
            let parsed = filter::parse_value_filter(inner, open + 1, opts)
                .map_err(|e| ParseError::path(input, e.offset(), e.message()))?;
            Some(parsed)
        } else {
            None
        };

        path.elements.push(Element {
            name: name.to_string(),
            filter,
        });
        if path.elements.len() > opts.max_depth {
            return Err(ParseError::path(
                input,
                name_start,
                format!("path is deeper than {} elements", opts.max_depth),
            ));
        }

        if p.eof() {
            break;
        }
        if !p.consume_char('.') {
            return Err(ParseError::path(input, p.pos(), "expected '.' or end of path"));
        }
        if p.eof() {
            return Err(ParseError::path(
                input,
                p.pos(),
                "expected an attribute name after '.'",
            ));
        }
    }
    Ok(path)
}

/// Split a leading `urn:...:` schema qualifier. Returns the URN and the
/// offset at which attribute elements start.
fn split_schema_urn(input: &str) -> Result<(Option<String>, usize), ParseError> {
    let is_urn = input.len() > 4
        && input
            .get(..4)
            .map(|p| p.eq_ignore_ascii_case("urn:"))
            .unwrap_or(false);
    if !is_urn {
        return Ok((None, 0));
    }
    // Colons inside a value filter belong to the filter.
    let scan_end = input.find('[').unwrap_or(input.len());
    let colon = input[..scan_end].rfind(':').unwrap_or(3);
    let urn = &input[..colon];
    if urn.len() <= 4 {
        return Err(ParseError::path(input, colon, "malformed schema URN"));
    }
    Ok((Some(urn.to_string()), colon + 1))
}
