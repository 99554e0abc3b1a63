//! JSON Schema contracts.
//!
//! Schemas are compiled once into a [`SchemaValidator`] and shared through a
//! [`SchemaRegistry`]. Validation never fails; it produces a [`ValidationReport`]
//! listing every violated constraint in evaluation order.
//!
//! ```rust
//! use serde_json::json;
//! use wirecheck::schema::SchemaRegistry;
//!
//! let registry = SchemaRegistry::builtin().unwrap();
//! let report = registry
//!     .validate("error", &json!({"error": {"type": "ValidationError", "message": "bad"}}))
//!     .unwrap();
//! assert!(!report.valid);
//! assert_eq!(report.violations[0].keyword, "required");
//! assert!(report.violations[0].message.contains("code"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::Value;

use crate::error::{HarnessError, SchemaError, ValidationFailure};

/// Contract schemas shipped with the crate, keyed by logical name.
pub const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    ("error", include_str!("../schemas/error.schema.json")),
    ("transcript", include_str!("../schemas/transcript.schema.json")),
    ("session-token", include_str!("../schemas/session-token.schema.json")),
    ("metadata", include_str!("../schemas/metadata.schema.json")),
    ("tts-request", include_str!("../schemas/tts-request.schema.json")),
    ("text-intelligence-request", include_str!("../schemas/text-intelligence-request.schema.json")),
    ("text-intelligence-query", include_str!("../schemas/text-intelligence-query.schema.json")),
    (
        "text-intelligence-response",
        include_str!("../schemas/text-intelligence-response.schema.json"),
    ),
    ("agent-welcome", include_str!("../schemas/agent-welcome.schema.json")),
    ("flux-turn-info", include_str!("../schemas/flux-turn-info.schema.json")),
];

/// One violated schema constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Schema keyword that failed (`required`, `type`, `enum`, `format`, ...).
    pub keyword: String,
    /// JSON pointer to the offending value (`""` for the root).
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        write!(f, "[{}] at {}: {}", self.keyword, path, self.message)
    }
}

/// Outcome of validating one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub schema: String,
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Convert a failed report into [`HarnessError::Validation`].
    pub fn into_result(self) -> Result<(), HarnessError> {
        if self.valid {
            Ok(())
        } else {
            Err(ValidationFailure { schema: self.schema, violations: self.violations }.into())
        }
    }

    /// True if some violation used `keyword`.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.violations.iter().any(|v| v.keyword == keyword)
    }
}

fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// A compiled, immutable schema.
pub struct SchemaValidator {
    name: String,
    compiled: JSONSchema,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator").field("name", &self.name).finish()
    }
}

impl SchemaValidator {
    /// Compile a schema document. Format assertions are always enabled.
    pub fn compile(name: impl Into<String>, schema: &Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let compiled = JSONSchema::options()
            .should_validate_formats(true)
            .with_format("uuid", is_uuid)
            .compile(schema)
            .map_err(|e| SchemaError::Compile { name: name.clone(), reason: e.to_string() })?;
        Ok(Self { name, compiled })
    }

    /// Parse and compile a schema from its JSON text.
    pub fn from_str(name: impl Into<String>, raw: &str) -> Result<Self, SchemaError> {
        let name = name.into();
        let schema: Value = serde_json::from_str(raw)
            .map_err(|e| SchemaError::Parse { name: name.clone(), reason: e.to_string() })?;
        Self::compile(name, &schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate a payload. Never fails; inspect the report.
    pub fn validate(&self, payload: &Value) -> ValidationReport {
        let violations = match self.compiled.validate(payload) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let schema_path = e.schema_path.to_string();
                    let keyword = schema_path
                        .rsplit('/')
                        .find(|segment| !segment.is_empty() && segment.parse::<usize>().is_err())
                        .unwrap_or("schema")
                        .to_string();
                    Violation { keyword, path: e.instance_path.to_string(), message: e.to_string() }
                })
                .collect(),
        };
        ValidationReport { schema: self.name.clone(), valid: violations.is_empty(), violations }
    }

    /// Shorthand for `validate(payload).valid`.
    pub fn is_valid(&self, payload: &Value) -> bool {
        self.compiled.is_valid(payload)
    }
}

/// Name → compiled schema. Cheap to clone; schemas are shared behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaValidator>>,
}

impl SchemaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every bundled contract schema.
    pub fn builtin() -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for (name, raw) in BUILTIN_SCHEMAS {
            registry.register(SchemaValidator::from_str(*name, raw)?);
        }
        Ok(registry)
    }

    /// Install a validator, replacing any previous one with the same name.
    pub fn register(&mut self, validator: SchemaValidator) -> Arc<SchemaValidator> {
        let validator = Arc::new(validator);
        self.schemas.insert(validator.name().to_string(), Arc::clone(&validator));
        validator
    }

    pub fn get(&self, name: &str) -> Result<Arc<SchemaValidator>, SchemaError> {
        self.schemas.get(name).cloned().ok_or_else(|| SchemaError::Unknown(name.to_string()))
    }

    pub fn validate(&self, name: &str, payload: &Value) -> Result<ValidationReport, SchemaError> {
        Ok(self.get(name)?.validate(payload))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
