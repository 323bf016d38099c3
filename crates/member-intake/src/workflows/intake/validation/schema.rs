use std::collections::BTreeSet;

use super::super::domain::FieldName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// Type constraint for a field's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Any non-blank text.
    Text,
    /// Opaque reference produced by an upload or lookup; non-blank without inner whitespace.
    Reference,
    /// `http`/`https` URL shaped string.
    Url,
    /// Value must be one of the listed options.
    OneOf(BTreeSet<String>),
    /// Listed choice must come from `options`; "Other" accepts free text.
    Specialization { options: BTreeSet<String> },
}

/// Additional format checks applied after the type constraint passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    MinLength(usize),
    MinWords(usize),
    Email,
}

/// Declarative constraint list for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub field: FieldName,
    pub presence: Presence,
    pub kind: FieldKind,
    pub formats: Vec<Format>,
}

impl FieldRule {
    pub fn required(field: FieldName, kind: FieldKind) -> Self {
        Self {
            field,
            presence: Presence::Required,
            kind,
            formats: Vec::new(),
        }
    }

    pub fn optional(field: FieldName, kind: FieldKind) -> Self {
        Self {
            field,
            presence: Presence::Optional,
            kind,
            formats: Vec::new(),
        }
    }

    pub fn with(mut self, format: Format) -> Self {
        self.formats.push(format);
        self
    }
}

/// Ordered set of field rules evaluated by the validation gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSchema {
    rules: Vec<FieldRule>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any earlier rule for the same field.
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.retain(|existing| existing.field != rule.field);
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn rule_for(&self, field: FieldName) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.field == field)
    }

    pub fn is_required(&self, field: FieldName) -> bool {
        self.rule_for(field)
            .map(|rule| rule.presence == Presence::Required)
            .unwrap_or(false)
    }
}
