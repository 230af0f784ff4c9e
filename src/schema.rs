//! Statically declared SCIM schema descriptors.
//!
//! Descriptors serialize in the shape of the SCIM `/Schemas` endpoint, so a
//! service provider's published schemas can be loaded with `serde_json`.

use serde::{Deserialize, Serialize};

use crate::path::Path;

pub const CORE_USER: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const CORE_GROUP: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const ENTERPRISE_USER: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Boolean,
    Decimal,
    Integer,
    DateTime,
    Binary,
    Reference,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadOnly,
    #[default]
    ReadWrite,
    Immutable,
    WriteOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Returned {
    Always,
    Never,
    #[default]
    Default,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Uniqueness {
    #[default]
    None,
    Server,
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub case_exact: bool,
    #[serde(default)]
    pub mutability: Mutability,
    #[serde(default)]
    pub returned: Returned,
    #[serde(default)]
    pub uniqueness: Uniqueness,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<AttributeDescriptor>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            multi_valued: false,
            description: None,
            required: false,
            case_exact: false,
            mutability: Mutability::default(),
            returned: Returned::default(),
            uniqueness: Uniqueness::default(),
            sub_attributes: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Boolean)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::DateTime)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Reference).case_exact()
    }

    pub fn complex(name: impl Into<String>, sub_attributes: Vec<AttributeDescriptor>) -> Self {
        let mut out = Self::new(name, AttributeType::Complex);
        out.sub_attributes = sub_attributes;
        out
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }

    pub fn mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn returned(mut self, returned: Returned) -> Self {
        self.returned = returned;
        self
    }

    pub fn uniqueness(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sub-attribute lookup; SCIM attribute names are case-insensitive.
    pub fn sub_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.sub_attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            description: None,
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn core_user() -> Self {
        let mut attributes = common_attributes();
        attributes.extend([
            AttributeDescriptor::string("userName")
                .required()
                .uniqueness(Uniqueness::Server),
            AttributeDescriptor::complex(
                "name",
                [
                    "formatted",
                    "familyName",
                    "givenName",
                    "middleName",
                    "honorificPrefix",
                    "honorificSuffix",
                ]
                .into_iter()
                .map(AttributeDescriptor::string)
                .collect(),
            ),
            AttributeDescriptor::string("displayName"),
            AttributeDescriptor::string("nickName"),
            AttributeDescriptor::reference("profileUrl"),
            AttributeDescriptor::string("title"),
            AttributeDescriptor::string("userType"),
            AttributeDescriptor::string("preferredLanguage"),
            AttributeDescriptor::string("locale"),
            AttributeDescriptor::string("timezone"),
            AttributeDescriptor::boolean("active"),
            AttributeDescriptor::string("password")
                .case_exact()
                .mutability(Mutability::WriteOnly)
                .returned(Returned::Never),
            plural("emails", Vec::new()),
            plural("phoneNumbers", Vec::new()),
            plural("ims", Vec::new()),
            plural("photos", Vec::new()),
            plural(
                "addresses",
                ["formatted", "streetAddress", "locality", "region", "postalCode", "country"]
                    .into_iter()
                    .map(AttributeDescriptor::string)
                    .collect(),
            ),
            AttributeDescriptor::complex(
                "groups",
                vec![
                    AttributeDescriptor::string("value").case_exact(),
                    AttributeDescriptor::reference("$ref"),
                    AttributeDescriptor::string("display"),
                    AttributeDescriptor::string("type"),
                ],
            )
            .multi_valued()
            .mutability(Mutability::ReadOnly),
            plural("entitlements", Vec::new()),
            plural("roles", Vec::new()),
            AttributeDescriptor::complex(
                "x509Certificates",
                vec![
                    AttributeDescriptor::new("value", AttributeType::Binary),
                    AttributeDescriptor::string("display"),
                    AttributeDescriptor::string("type"),
                    AttributeDescriptor::boolean("primary"),
                ],
            )
            .multi_valued(),
        ]);
        Self::new(CORE_USER, "User", attributes)
    }

    pub fn core_group() -> Self {
        let mut attributes = common_attributes();
        attributes.extend([
            AttributeDescriptor::string("displayName").required(),
            AttributeDescriptor::complex(
                "members",
                vec![
                    AttributeDescriptor::string("value")
                        .case_exact()
                        .mutability(Mutability::Immutable),
                    AttributeDescriptor::reference("$ref").mutability(Mutability::Immutable),
                    AttributeDescriptor::string("display"),
                    AttributeDescriptor::string("type").mutability(Mutability::Immutable),
                ],
            )
            .multi_valued(),
        ]);
        Self::new(CORE_GROUP, "Group", attributes)
    }

    pub fn enterprise_user() -> Self {
        Self::new(
            ENTERPRISE_USER,
            "EnterpriseUser",
            vec![
                AttributeDescriptor::string("employeeNumber"),
                AttributeDescriptor::string("costCenter"),
                AttributeDescriptor::string("organization"),
                AttributeDescriptor::string("division"),
                AttributeDescriptor::string("department"),
                AttributeDescriptor::complex(
                    "manager",
                    vec![
                        AttributeDescriptor::string("value").case_exact(),
                        AttributeDescriptor::reference("$ref"),
                        AttributeDescriptor::string("displayName").mutability(Mutability::ReadOnly),
                    ],
                ),
            ],
        )
    }
}

fn common_attributes() -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::string("id")
            .case_exact()
            .mutability(Mutability::ReadOnly)
            .returned(Returned::Always)
            .uniqueness(Uniqueness::Server),
        AttributeDescriptor::string("externalId").case_exact(),
        AttributeDescriptor::complex(
            "meta",
            vec![
                AttributeDescriptor::string("resourceType").case_exact(),
                AttributeDescriptor::date_time("created"),
                AttributeDescriptor::date_time("lastModified"),
                AttributeDescriptor::reference("location"),
                AttributeDescriptor::string("version").case_exact(),
            ],
        )
        .mutability(Mutability::ReadOnly),
    ]
}

/// The usual `value`/`display`/`type`/`primary` multi-valued shape.
fn plural(name: &str, extra: Vec<AttributeDescriptor>) -> AttributeDescriptor {
    let mut subs = vec![
        AttributeDescriptor::string("value"),
        AttributeDescriptor::string("display"),
        AttributeDescriptor::string("type"),
        AttributeDescriptor::boolean("primary"),
    ];
    subs.extend(extra);
    AttributeDescriptor::complex(name, subs).multi_valued()
}

/// A resource type's core schema plus its extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSchema {
    pub core: SchemaDescriptor,
    pub extensions: Vec<SchemaDescriptor>,
}

impl ResourceSchema {
    pub fn new(core: SchemaDescriptor) -> Self {
        Self {
            core,
            extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: SchemaDescriptor) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn user() -> Self {
        Self::new(SchemaDescriptor::core_user()).with_extension(SchemaDescriptor::enterprise_user())
    }

    pub fn group() -> Self {
        Self::new(SchemaDescriptor::core_group())
    }

    pub fn schema(&self, urn: Option<&str>) -> Option<&SchemaDescriptor> {
        match urn {
            None => Some(&self.core),
            Some(urn) => std::iter::once(&self.core)
                .chain(&self.extensions)
                .find(|s| s.id.eq_ignore_ascii_case(urn)),
        }
    }

    /// The descriptor a path points at, ignoring value filters.
    pub fn find(&self, path: &Path) -> Option<&AttributeDescriptor> {
        let schema = self.schema(path.schema_urn())?;
        let mut elements = path.elements().iter();
        let mut attr = schema.attribute(elements.next()?.name())?;
        for element in elements {
            attr = attr.sub_attribute(element.name())?;
        }
        Some(attr)
    }
}
