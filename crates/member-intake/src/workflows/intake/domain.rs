use serde::{Deserialize, Serialize};

/// Identifier of the applicant or registrant the record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

/// Reference to an existing member record (used for referrals).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberRef(pub String);

/// Which intake flow a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    MemberApplication,
    EventRegistration,
}

impl FlowKind {
    pub const fn label(self) -> &'static str {
        match self {
            FlowKind::MemberApplication => "member_application",
            FlowKind::EventRegistration => "event_registration",
        }
    }
}

/// Logical page of the multi-step form. All sections share one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    Profile,
    Attendee,
    Specialization,
    Motivation,
}

impl SectionId {
    pub const fn label(self) -> &'static str {
        match self {
            SectionId::Profile => "profile",
            SectionId::Attendee => "attendee",
            SectionId::Specialization => "specialization",
            SectionId::Motivation => "motivation",
        }
    }
}

/// Tracked fields of the record; keys of the validation error map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    SubjectId,
    ProfilePhotoRef,
    DocumentRef,
    SpecializationArea,
    MotivationText,
    ReferralRef,
    ContactEmail,
    PortfolioUrl,
}

impl FieldName {
    pub const fn label(self) -> &'static str {
        match self {
            FieldName::SubjectId => "subject_id",
            FieldName::ProfilePhotoRef => "profile_photo_ref",
            FieldName::DocumentRef => "document_ref",
            FieldName::SpecializationArea => "specialization_area",
            FieldName::MotivationText => "motivation_text",
            FieldName::ReferralRef => "referral_ref",
            FieldName::ContactEmail => "contact_email",
            FieldName::PortfolioUrl => "portfolio_url",
        }
    }
}

/// Binary asset slot backed by its own upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSlot {
    Photo,
    Document,
}

impl UploadSlot {
    pub const ALL: [UploadSlot; 2] = [UploadSlot::Photo, UploadSlot::Document];

    pub const fn label(self) -> &'static str {
        match self {
            UploadSlot::Photo => "photo",
            UploadSlot::Document => "document",
        }
    }

    /// Record field that receives the slot's resulting reference.
    pub const fn field(self) -> FieldName {
        match self {
            UploadSlot::Photo => FieldName::ProfilePhotoRef,
            UploadSlot::Document => FieldName::DocumentRef,
        }
    }
}

/// Specialization choice. Picking "Other" replaces the option list with free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Specialization {
    Listed(String),
    Other(String),
}

impl Specialization {
    pub fn text(&self) -> &str {
        match self {
            Specialization::Listed(value) | Specialization::Other(value) => value,
        }
    }
}

/// Working copy of an application or registration while the intake flow is mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub subject_id: Option<SubjectId>,
    pub profile_photo_ref: Option<String>,
    pub document_ref: Option<String>,
    pub specialization_area: Option<Specialization>,
    pub motivation_text: Option<String>,
    pub referral_ref: Option<MemberRef>,
    pub contact_email: Option<String>,
    pub portfolio_url: Option<String>,
}

impl ApplicationRecord {
    pub fn for_subject(subject_id: SubjectId) -> Self {
        Self {
            subject_id: Some(subject_id),
            ..Self::default()
        }
    }

    /// Raw textual value of a field, if set.
    pub fn field_text(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::SubjectId => self.subject_id.as_ref().map(|id| id.0.as_str()),
            FieldName::ProfilePhotoRef => self.profile_photo_ref.as_deref(),
            FieldName::DocumentRef => self.document_ref.as_deref(),
            FieldName::SpecializationArea => self.specialization_area.as_ref().map(Specialization::text),
            FieldName::MotivationText => self.motivation_text.as_deref(),
            FieldName::ReferralRef => self.referral_ref.as_ref().map(|member| member.0.as_str()),
            FieldName::ContactEmail => self.contact_email.as_deref(),
            FieldName::PortfolioUrl => self.portfolio_url.as_deref(),
        }
    }

    /// True when the field holds something other than whitespace.
    pub fn is_present(&self, field: FieldName) -> bool {
        self.field_text(field)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn upload_ref(&self, slot: UploadSlot) -> Option<&str> {
        self.field_text(slot.field())
    }

    pub(crate) fn set_upload_ref(&mut self, slot: UploadSlot, reference: Option<String>) {
        match slot {
            UploadSlot::Photo => self.profile_photo_ref = reference,
            UploadSlot::Document => self.document_ref = reference,
        }
    }

    /// Apply a user edit and report which field it touched.
    pub fn apply(&mut self, edit: RecordEdit) -> FieldName {
        match edit {
            RecordEdit::Specialization(choice) => {
                self.specialization_area = choice;
                FieldName::SpecializationArea
            }
            RecordEdit::Motivation(text) => {
                self.motivation_text = Some(text);
                FieldName::MotivationText
            }
            RecordEdit::Referral(member) => {
                self.referral_ref = member;
                FieldName::ReferralRef
            }
            RecordEdit::ContactEmail(email) => {
                self.contact_email = email;
                FieldName::ContactEmail
            }
            RecordEdit::PortfolioUrl(url) => {
                self.portfolio_url = url;
                FieldName::PortfolioUrl
            }
        }
    }
}

/// User-originated field mutation. Upload references are only written by upload completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum RecordEdit {
    Specialization(Option<Specialization>),
    Motivation(String),
    Referral(Option<MemberRef>),
    ContactEmail(Option<String>),
    PortfolioUrl(Option<String>),
}

/// Number of words in rich text once markup is stripped.
pub fn word_count(text: &str) -> usize {
    plain_text(text).split_whitespace().count()
}

/// Drops `<...>` markup and decodes `&nbsp;`, leaving the readable words.
pub(crate) fn plain_text(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                plain.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }
    plain.replace("&nbsp;", " ")
}
