use std::collections::{BTreeMap, BTreeSet};

use super::domain::{
    word_count, ApplicationRecord, FieldName, FlowKind, MemberRef, SectionId, UploadSlot,
};
use super::uploads::UploadPolicy;
use super::validation::{FieldKind, FieldRule, Format, ValidationSchema};

/// Minimum motivation word count for membership applications.
pub const MEMBER_MOTIVATION_MIN_WORDS: usize = 50;
/// Minimum motivation word count for event registrations.
pub const EVENT_MOTIVATION_MIN_WORDS: usize = 20;

/// Upload size cap applied when the host configures none.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// How a section derives its completion flag from the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionRule {
    AllPresent(Vec<FieldName>),
    MinimumWords { field: FieldName, minimum: usize },
}

impl CompletionRule {
    pub fn is_satisfied(&self, record: &ApplicationRecord) -> bool {
        match self {
            CompletionRule::AllPresent(fields) => {
                fields.iter().all(|field| record.is_present(*field))
            }
            CompletionRule::MinimumWords { field, minimum } => record
                .field_text(*field)
                .map(|text| word_count(text) >= *minimum)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTemplate {
    pub id: SectionId,
    pub title: &'static str,
    pub completion: CompletionRule,
}

/// Static description of an intake flow: its sections, upload slots, and thresholds.
#[derive(Debug, Clone)]
pub struct FlowBlueprint {
    kind: FlowKind,
    sections: Vec<SectionTemplate>,
    required_slots: Vec<UploadSlot>,
    upload_policies: BTreeMap<UploadSlot, UploadPolicy>,
    motivation_min_words: usize,
    specialization_options: Vec<&'static str>,
}

impl FlowBlueprint {
    pub fn for_kind(kind: FlowKind) -> Self {
        match kind {
            FlowKind::MemberApplication => Self::member_application(),
            FlowKind::EventRegistration => Self::event_registration(),
        }
    }

    pub fn member_application() -> Self {
        let motivation_min_words = MEMBER_MOTIVATION_MIN_WORDS;
        Self {
            kind: FlowKind::MemberApplication,
            sections: vec![
                SectionTemplate {
                    id: SectionId::Profile,
                    title: "Profile & documents",
                    completion: CompletionRule::AllPresent(vec![
                        FieldName::ProfilePhotoRef,
                        FieldName::DocumentRef,
                    ]),
                },
                SectionTemplate {
                    id: SectionId::Specialization,
                    title: "Specialization",
                    completion: CompletionRule::AllPresent(vec![FieldName::SpecializationArea]),
                },
                SectionTemplate {
                    id: SectionId::Motivation,
                    title: "Motivation",
                    completion: CompletionRule::MinimumWords {
                        field: FieldName::MotivationText,
                        minimum: motivation_min_words,
                    },
                },
            ],
            required_slots: vec![UploadSlot::Photo, UploadSlot::Document],
            upload_policies: default_upload_policies(DEFAULT_MAX_UPLOAD_BYTES),
            motivation_min_words,
            specialization_options: standard_specializations(),
        }
    }

    pub fn event_registration() -> Self {
        let motivation_min_words = EVENT_MOTIVATION_MIN_WORDS;
        Self {
            kind: FlowKind::EventRegistration,
            sections: vec![
                SectionTemplate {
                    id: SectionId::Attendee,
                    title: "Attendee details",
                    completion: CompletionRule::AllPresent(vec![
                        FieldName::ContactEmail,
                        FieldName::ProfilePhotoRef,
                    ]),
                },
                SectionTemplate {
                    id: SectionId::Motivation,
                    title: "Why you want to attend",
                    completion: CompletionRule::MinimumWords {
                        field: FieldName::MotivationText,
                        minimum: motivation_min_words,
                    },
                },
            ],
            required_slots: vec![UploadSlot::Photo],
            upload_policies: default_upload_policies(DEFAULT_MAX_UPLOAD_BYTES),
            motivation_min_words,
            specialization_options: Vec::new(),
        }
    }

    /// Apply a byte cap to every upload slot.
    pub fn with_max_upload_bytes(mut self, max_bytes: u64) -> Self {
        for policy in self.upload_policies.values_mut() {
            policy.max_bytes = max_bytes;
        }
        self
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn sections(&self) -> &[SectionTemplate] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionTemplate> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|section| section.id).collect()
    }

    pub fn required_slots(&self) -> &[UploadSlot] {
        &self.required_slots
    }

    pub fn upload_policy(&self, slot: UploadSlot) -> Option<&UploadPolicy> {
        self.upload_policies.get(&slot)
    }

    pub fn motivation_min_words(&self) -> usize {
        self.motivation_min_words
    }

    pub fn specialization_options(&self) -> &[&'static str] {
        &self.specialization_options
    }

    /// Prompt copy for the motivation field, rendered from the enforced minimum.
    pub fn motivation_prompt(&self) -> String {
        let subject = match self.kind {
            FlowKind::MemberApplication => "why you would like to join",
            FlowKind::EventRegistration => "why you would like to attend",
        };
        format!(
            "Tell us {subject} (minimum {} words).",
            self.motivation_min_words
        )
    }

    /// Validation schema for this flow. Referrals must point at one of `referral_candidates`.
    pub fn schema(&self, referral_candidates: &[MemberRef]) -> ValidationSchema {
        let members: BTreeSet<String> = referral_candidates
            .iter()
            .map(|member| member.0.clone())
            .collect();

        let mut schema = ValidationSchema::new()
            .rule(FieldRule::required(FieldName::SubjectId, FieldKind::Reference))
            .rule(
                FieldRule::required(FieldName::MotivationText, FieldKind::Text)
                    .with(Format::MinWords(self.motivation_min_words)),
            )
            .rule(FieldRule::optional(FieldName::PortfolioUrl, FieldKind::Url));

        for slot in UploadSlot::ALL {
            let rule = if self.required_slots.contains(&slot) {
                FieldRule::required(slot.field(), FieldKind::Reference)
            } else {
                FieldRule::optional(slot.field(), FieldKind::Reference)
            };
            schema = schema.rule(rule);
        }

        match self.kind {
            FlowKind::MemberApplication => schema
                .rule(
                    FieldRule::required(
                        FieldName::SpecializationArea,
                        FieldKind::Specialization {
                            options: self
                                .specialization_options
                                .iter()
                                .map(|option| option.to_string())
                                .collect(),
                        },
                    )
                    .with(Format::MinLength(3)),
                )
                .rule(FieldRule::optional(
                    FieldName::ReferralRef,
                    FieldKind::OneOf(members),
                ))
                .rule(
                    FieldRule::optional(FieldName::ContactEmail, FieldKind::Text)
                        .with(Format::Email),
                ),
            FlowKind::EventRegistration => schema.rule(
                FieldRule::required(FieldName::ContactEmail, FieldKind::Text).with(Format::Email),
            ),
        }
    }
}

fn default_upload_policies(max_bytes: u64) -> BTreeMap<UploadSlot, UploadPolicy> {
    let mut policies = BTreeMap::new();
    policies.insert(
        UploadSlot::Photo,
        UploadPolicy {
            accepted: vec!["image/*"],
            max_bytes,
        },
    );
    policies.insert(
        UploadSlot::Document,
        UploadPolicy {
            accepted: vec![
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ],
            max_bytes,
        },
    );
    policies
}

fn standard_specializations() -> Vec<&'static str> {
    vec![
        "Biotechnology",
        "Clinical Research",
        "Data Science",
        "Environmental Science",
        "Public Health",
        "Software Engineering",
    ]
}
