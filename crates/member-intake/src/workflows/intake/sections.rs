use serde::Serialize;

use super::blueprint::SectionTemplate;
use super::domain::{ApplicationRecord, SectionId};

/// What the primary button of the active section does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    Continue,
    Submit,
}

/// Result of pressing the primary button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueOutcome {
    Advanced(SectionId),
    /// The active section is the last one; the caller must hand off to submission.
    SubmitRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("section '{}' is not part of this flow", .0.label())]
    UnknownSection(SectionId),
    #[error("a flow needs at least one section")]
    NoSections,
}

/// Per-section completion snapshot. Derived on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub id: SectionId,
    pub title: &'static str,
    pub complete: bool,
    pub active: bool,
}

/// Tracks the active section of a multi-step form. Moving between sections never touches the
/// record, so every section's data survives any navigation order.
#[derive(Debug, Clone)]
pub struct SectionController {
    sections: Vec<SectionTemplate>,
    active: usize,
}

impl SectionController {
    /// `sections` must be non-empty; `active` always indexes into it afterwards.
    pub fn new(sections: Vec<SectionTemplate>) -> Result<Self, NavigationError> {
        if sections.is_empty() {
            return Err(NavigationError::NoSections);
        }
        Ok(Self { sections, active: 0 })
    }

    pub fn active(&self) -> SectionId {
        self.sections[self.active].id
    }

    pub fn is_first(&self) -> bool {
        self.active == 0
    }

    pub fn is_last(&self) -> bool {
        self.active + 1 >= self.sections.len()
    }

    pub fn primary_action(&self) -> PrimaryAction {
        if self.is_last() {
            PrimaryAction::Submit
        } else {
            PrimaryAction::Continue
        }
    }

    pub fn next(&mut self) -> ContinueOutcome {
        if self.is_last() {
            return ContinueOutcome::SubmitRequested;
        }
        self.active += 1;
        ContinueOutcome::Advanced(self.active())
    }

    /// Step back one section. Returns `None` on the first section, where "Back" leaves the flow.
    pub fn previous(&mut self) -> Option<SectionId> {
        if self.is_first() {
            return None;
        }
        self.active -= 1;
        Some(self.active())
    }

    pub fn go_to(&mut self, id: SectionId) -> Result<SectionId, NavigationError> {
        let index = self
            .sections
            .iter()
            .position(|section| section.id == id)
            .ok_or(NavigationError::UnknownSection(id))?;
        self.active = index;
        Ok(id)
    }

    pub fn is_complete(&self, id: SectionId, record: &ApplicationRecord) -> bool {
        self.sections
            .iter()
            .find(|section| section.id == id)
            .map(|section| section.completion.is_satisfied(record))
            .unwrap_or(false)
    }

    pub fn all_complete(&self, record: &ApplicationRecord) -> bool {
        self.sections
            .iter()
            .all(|section| section.completion.is_satisfied(record))
    }

    pub fn progress(&self, record: &ApplicationRecord) -> Vec<SectionProgress> {
        self.sections
            .iter()
            .enumerate()
            .map(|(index, section)| SectionProgress {
                id: section.id,
                title: section.title,
                complete: section.completion.is_satisfied(record),
                active: index == self.active,
            })
            .collect()
    }
}
