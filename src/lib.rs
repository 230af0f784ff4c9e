//! Core of a SCIM 2.0 SDK: attribute paths, filters, and PATCH semantics
//! over schemaless JSON resources.
//!
//! ```
//! use scim2_sdk::{GenericResource, PatchRequest, Path};
//! use serde_json::json;
//!
//! let mut user = GenericResource::from_value(json!({
//!     "userName": "bjensen",
//!     "emails": [{"type": "work", "value": "bjensen@example.com"}]
//! })).unwrap();
//!
//! let patch = PatchRequest::parse(r#"{
//!     "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!     "Operations": [{"op": "replace", "path": "emails[type eq \"work\"].value", "value": "bj@example.com"}]
//! }"#, &Default::default()).unwrap();
//! user.apply_patch(&patch).unwrap();
//!
//! let path: Path = "emails.value".parse().unwrap();
//! assert_eq!(user.get_value(&path), Some(&json!("bj@example.com")));
//! ```

pub mod errors;
pub mod context;
mod parser;
pub mod lexer;
pub mod path;
pub mod filter;
pub mod comparison;
pub mod evaluator;
pub mod schema;
pub mod engine;
pub mod patch;
pub mod resource;

pub use context::{ParserOptions, PatchOptions};
pub use engine::{add_value, find_values, remove_values, replace_value, DocumentEngine};
pub use errors::{ParseError, Result, ScimError};
pub use evaluator::{matches, FilterEvaluator};
pub use filter::{parse_filter, CompareOp, Filter};
pub use patch::{PatchOperation, PatchRequest, PATCH_OP_SCHEMA};
pub use path::{parse_path, Element, Path};
pub use resource::GenericResource;
pub use schema::{AttributeDescriptor, ResourceSchema, SchemaDescriptor};
