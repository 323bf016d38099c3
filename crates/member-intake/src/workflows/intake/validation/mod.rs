mod rules;
mod schema;

pub use schema::{FieldKind, FieldRule, Format, Presence, ValidationSchema};

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::domain::{ApplicationRecord, FieldName};

/// Field → message map produced by a failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<FieldName, String>);

impl FieldErrors {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = FieldName> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .iter()
            .map(|(field, message)| format!("{}: {}", field.label(), message))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl FromIterator<(FieldName, String)> for FieldErrors {
    fn from_iter<T: IntoIterator<Item = (FieldName, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stateless validator applying a declarative schema to a record.
///
/// Validation is pure and synchronous, so it is safe to call on every keystroke.
#[derive(Debug, Clone)]
pub struct ValidationGate {
    schema: ValidationSchema,
}

impl ValidationGate {
    pub fn new(schema: ValidationSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }

    pub fn validate(&self, record: &ApplicationRecord) -> Result<(), FieldErrors> {
        let errors: FieldErrors = self
            .schema
            .rules()
            .iter()
            .filter_map(|rule| rules::check_rule(rule, record).map(|message| (rule.field, message)))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Check a single field, e.g. on blur. Fields without a rule always pass.
    pub fn validate_field(&self, record: &ApplicationRecord, field: FieldName) -> Option<String> {
        self.schema
            .rule_for(field)
            .and_then(|rule| rules::check_rule(rule, record))
    }
}
