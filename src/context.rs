use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default bound on filter nesting and path length.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Knobs for the path and filter parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserOptions {
    /// Characters accepted in attribute names in addition to
    /// alphanumerics, `-`, `_` and `$`.
    pub extended_attribute_chars: BTreeSet<char>,
    /// Maximum nesting of parentheses, `not` and value filters, and the
    /// maximum number of elements in a path.
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            extended_attribute_chars: BTreeSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserOptions {
    pub fn allow_chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.extended_attribute_chars.extend(chars);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn is_attribute_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric()
            || c == '-'
            || c == '_'
            || c == '$'
            || self.extended_attribute_chars.contains(&c)
    }
}

/// Behaviour of [`crate::patch::PatchRequest::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchOptions {
    pub parser: ParserOptions,
    /// Treat a remove/replace that matches nothing as a no-op instead of
    /// aborting the request.
    pub ignore_no_target: bool,
    /// Append an extension URN to the document's `schemas` array when an
    /// operation writes into that extension.
    pub update_schemas: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            parser: ParserOptions::default(),
            ignore_no_target: false,
            update_schemas: true,
        }
    }
}
