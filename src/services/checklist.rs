//! Home-check session model: the checklist state machine.
//!
//! DESIGN
//! ======
//! A home check is one mutable record: status, timing, an ordered list of
//! checklist sections, notes, weather and overall condition. Transitions:
//!
//! ```text
//! not_started --start--> in_progress --complete--> completed
//! ```
//!
//! `in_progress` is the only editable state. `complete` is gated on every
//! required item being done. Every successful mutation bumps `version`, which
//! the autosave worker uses to decide whether a flushed snapshot is current.
//!
//! This module is pure: no I/O, callers pass `now` in milliseconds.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::double_option;

const EMBEDDED_TEMPLATE: &str = include_str!("../../templates/checklist.yaml");

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("cannot move home check from {from} to {to}")]
    InvalidTransition { from: CheckStatus, to: CheckStatus },
    #[error("home check is {0}; only in-progress checks can be edited")]
    NotEditable(CheckStatus),
    #[error("checklist item not found: {0}")]
    ItemNotFound(Uuid),
    #[error("required checklist item cannot be removed: {0}")]
    RequiredItem(Uuid),
    #[error("photo not found on item: {0}")]
    PhotoNotFound(Uuid),
    #[error("text must not be empty")]
    EmptyText,
    #[error("{} required item(s) incomplete", .0.len())]
    MissingRequired(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read checklist template: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid checklist template: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid checklist template: {0}")]
    Invalid(String),
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl CheckStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall property condition recorded by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
    NeedsAttention,
}

impl Condition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::NeedsAttention => "needs_attention",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            "poor" => Some(Self::Poor),
            "needs_attention" => Some(Self::NeedsAttention),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub text: String,
    pub done: bool,
    pub required: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

/// One category of the checklist. Sections keep template order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistSection {
    pub category: String,
    pub items: Vec<ChecklistItem>,
}

/// The whole home-check record. Mirrors the `home_checks` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeCheckSession {
    pub id: Uuid,
    pub property_id: Uuid,
    pub watcher_id: Option<Uuid>,
    pub scheduled_for: Option<i64>,
    pub status: CheckStatus,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub elapsed_seconds: i64,
    pub duration_seconds: Option<i64>,
    pub checklist: Vec<ChecklistSection>,
    pub general_notes: String,
    pub weather: Option<String>,
    pub condition: Option<Condition>,
    pub version: i32,
    pub created_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update for a single checklist item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    pub done: Option<bool>,
    pub notes: Option<String>,
    pub text: Option<String>,
}

/// Partial update for the record-level fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailsPatch {
    pub general_notes: Option<String>,
    /// `Some(None)` clears the weather text.
    #[serde(default, deserialize_with = "double_option")]
    pub weather: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub condition: Option<Option<Condition>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryProgress {
    pub category: String,
    pub total: usize,
    pub done: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: usize,
    pub done: usize,
    pub percent: u32,
    pub required_total: usize,
    pub required_done: usize,
    pub required_percent: u32,
    pub categories: Vec<CategoryProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingItem {
    pub id: Uuid,
    pub category: String,
    pub text: String,
}

/// Review screen shown before submission.
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub id: Uuid,
    pub property_id: Uuid,
    pub status: CheckStatus,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub elapsed_seconds: i64,
    pub progress: Progress,
    pub missing_required: Vec<MissingItem>,
    pub photo_count: usize,
    pub notes_count: usize,
    pub general_notes: String,
    pub weather: Option<String>,
    pub condition: Option<Condition>,
    pub can_submit: bool,
}

// =============================================================================
// TEMPLATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateItem {
    pub text: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateCategory {
    pub name: String,
    pub items: Vec<TemplateItem>,
}

/// Checklist blueprint copied into every newly scheduled check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChecklistTemplate {
    pub categories: Vec<TemplateCategory>,
}

impl ChecklistTemplate {
    /// Parse and validate a YAML template.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML, no categories, blank names or
    /// duplicate category names.
    pub fn from_yaml(source: &str) -> Result<Self, TemplateError> {
        let template: Self = serde_yaml::from_str(source)?;
        template.validate()?;
        Ok(template)
    }

    /// The template compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded YAML is invalid.
    pub fn embedded() -> Result<Self, TemplateError> {
        Self::from_yaml(EMBEDDED_TEMPLATE)
    }

    /// Load the override file when given, otherwise the embedded default.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, TemplateError> {
        match path {
            Some(path) => Self::from_yaml(&std::fs::read_to_string(path)?),
            None => Self::embedded(),
        }
    }

    fn validate(&self) -> Result<(), TemplateError> {
        if self.categories.is_empty() {
            return Err(TemplateError::Invalid("no categories".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() {
                return Err(TemplateError::Invalid("blank category name".into()));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(TemplateError::Invalid(format!("duplicate category: {name}")));
            }
            if category.items.iter().any(|item| item.text.trim().is_empty()) {
                return Err(TemplateError::Invalid(format!("blank item text in category: {name}")));
            }
        }
        Ok(())
    }

    /// Fresh checklist sections with new item ids.
    #[must_use]
    pub fn instantiate(&self) -> Vec<ChecklistSection> {
        self.categories
            .iter()
            .map(|category| ChecklistSection {
                category: category.name.trim().to_owned(),
                items: category
                    .items
                    .iter()
                    .map(|item| ChecklistItem {
                        id: Uuid::new_v4(),
                        text: item.text.trim().to_owned(),
                        done: false,
                        required: item.required,
                        notes: String::new(),
                        photo_urls: Vec::new(),
                    })
                    .collect(),
            })
            .collect()
    }
}

// =============================================================================
// SESSION
// =============================================================================

impl HomeCheckSession {
    /// A new, not-started check for `property_id`.
    #[must_use]
    pub fn schedule(
        property_id: Uuid,
        watcher_id: Option<Uuid>,
        scheduled_for: Option<i64>,
        created_by: Option<Uuid>,
        template: &ChecklistTemplate,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            watcher_id,
            scheduled_for,
            status: CheckStatus::NotStarted,
            started_at: None,
            completed_at: None,
            elapsed_seconds: 0,
            duration_seconds: None,
            checklist: template.instantiate(),
            general_notes: String::new(),
            weather: None,
            condition: None,
            version: 1,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// `not_started` → `in_progress`, stamping `started_at`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from any other state.
    pub fn start(&mut self, now: i64) -> Result<(), CheckError> {
        if self.status != CheckStatus::NotStarted {
            return Err(CheckError::InvalidTransition { from: self.status, to: CheckStatus::InProgress });
        }
        self.status = CheckStatus::InProgress;
        self.started_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// `in_progress` → `completed`, gated on all required items being done.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless in progress, `MissingRequired` with
    /// the text of each incomplete required item otherwise.
    pub fn complete(&mut self, now: i64) -> Result<(), CheckError> {
        if self.status != CheckStatus::InProgress {
            return Err(CheckError::InvalidTransition { from: self.status, to: CheckStatus::Completed });
        }
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(CheckError::MissingRequired(missing.into_iter().map(|m| m.text).collect()));
        }
        let duration = self.elapsed_seconds_at(now);
        self.status = CheckStatus::Completed;
        self.completed_at = Some(now);
        self.duration_seconds = Some(duration);
        self.elapsed_seconds = duration;
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
        Ok(())
    }

    /// Seconds on the clock at `now`, derived from the wall-clock delta.
    #[must_use]
    pub fn elapsed_seconds_at(&self, now: i64) -> i64 {
        match self.status {
            CheckStatus::NotStarted => 0,
            CheckStatus::InProgress => self
                .started_at
                .map_or(0, |started| (now.saturating_sub(started) / 1000).max(0)),
            CheckStatus::Completed => self.duration_seconds.unwrap_or(self.elapsed_seconds),
        }
    }

    pub fn refresh_elapsed(&mut self, now: i64) {
        self.elapsed_seconds = self.elapsed_seconds_at(now);
    }

    fn ensure_editable(&self) -> Result<(), CheckError> {
        if self.status == CheckStatus::InProgress {
            Ok(())
        } else {
            Err(CheckError::NotEditable(self.status))
        }
    }

    fn touch(&mut self, now: i64) {
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
        self.refresh_elapsed(now);
    }

    #[must_use]
    pub fn item(&self, item_id: Uuid) -> Option<&ChecklistItem> {
        self.checklist
            .iter()
            .flat_map(|section| section.items.iter())
            .find(|item| item.id == item_id)
    }

    fn item_mut(&mut self, item_id: Uuid) -> Result<&mut ChecklistItem, CheckError> {
        self.checklist
            .iter_mut()
            .flat_map(|section| section.items.iter_mut())
            .find(|item| item.id == item_id)
            .ok_or(CheckError::ItemNotFound(item_id))
    }

    /// Apply a partial update to one item.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable`, `ItemNotFound`, or `EmptyText` for a blank text.
    pub fn update_item(&mut self, item_id: Uuid, patch: ItemPatch, now: i64) -> Result<ChecklistItem, CheckError> {
        self.ensure_editable()?;
        let text = match patch.text {
            Some(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(CheckError::EmptyText);
                }
                Some(trimmed.to_owned())
            }
            None => None,
        };

        let item = self.item_mut(item_id)?;
        if let Some(done) = patch.done {
            item.done = done;
        }
        if let Some(notes) = patch.notes {
            item.notes = notes;
        }
        if let Some(text) = text {
            item.text = text;
        }
        let updated = item.clone();
        self.touch(now);
        Ok(updated)
    }

    /// Append a custom (never required) item, creating the category if needed.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable`, or `EmptyText` for a blank category or text.
    pub fn add_item(&mut self, category: &str, text: &str, now: i64) -> Result<ChecklistItem, CheckError> {
        self.ensure_editable()?;
        let category = category.trim();
        let text = text.trim();
        if category.is_empty() || text.is_empty() {
            return Err(CheckError::EmptyText);
        }

        let item = ChecklistItem {
            id: Uuid::new_v4(),
            text: text.to_owned(),
            done: false,
            required: false,
            notes: String::new(),
            photo_urls: Vec::new(),
        };

        let existing = self
            .checklist
            .iter_mut()
            .find(|section| section.category.eq_ignore_ascii_case(category));
        match existing {
            Some(section) => section.items.push(item.clone()),
            None => self.checklist.push(ChecklistSection { category: category.to_owned(), items: vec![item.clone()] }),
        }
        self.touch(now);
        Ok(item)
    }

    /// Remove a non-required item.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable`, `ItemNotFound`, or `RequiredItem`.
    pub fn remove_item(&mut self, item_id: Uuid, now: i64) -> Result<ChecklistItem, CheckError> {
        self.ensure_editable()?;
        let (section_index, item_index) = self
            .checklist
            .iter()
            .enumerate()
            .find_map(|(s, section)| {
                section
                    .items
                    .iter()
                    .position(|item| item.id == item_id)
                    .map(|i| (s, i))
            })
            .ok_or(CheckError::ItemNotFound(item_id))?;

        let items = &mut self.checklist[section_index].items;
        if items[item_index].required {
            return Err(CheckError::RequiredItem(item_id));
        }
        let removed = items.remove(item_index);
        self.touch(now);
        Ok(removed)
    }

    /// Attach a stored photo URL to an item.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable` or `ItemNotFound`.
    pub fn add_photo(&mut self, item_id: Uuid, url: String, now: i64) -> Result<(), CheckError> {
        self.ensure_editable()?;
        self.item_mut(item_id)?.photo_urls.push(url);
        self.touch(now);
        Ok(())
    }

    /// Detach the photo whose file stem is `photo_id`, returning its URL.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable`, `ItemNotFound`, or `PhotoNotFound`.
    pub fn remove_photo(&mut self, item_id: Uuid, photo_id: Uuid, now: i64) -> Result<String, CheckError> {
        self.ensure_editable()?;
        let item = self.item_mut(item_id)?;
        let needle = format!("/{photo_id}.");
        let index = item
            .photo_urls
            .iter()
            .position(|url| url.contains(&needle))
            .ok_or(CheckError::PhotoNotFound(photo_id))?;
        let url = item.photo_urls.remove(index);
        self.touch(now);
        Ok(url)
    }

    /// Update general notes, weather and condition.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable` unless in progress.
    pub fn update_details(&mut self, patch: DetailsPatch, now: i64) -> Result<(), CheckError> {
        self.ensure_editable()?;
        if let Some(notes) = patch.general_notes {
            self.general_notes = notes;
        }
        if let Some(weather) = patch.weather {
            self.weather = weather.map(|w| w.trim().to_owned()).filter(|w| !w.is_empty());
        }
        if let Some(condition) = patch.condition {
            self.condition = condition;
        }
        self.touch(now);
        Ok(())
    }

    /// Required items not yet done, in checklist order.
    #[must_use]
    pub fn missing_required(&self) -> Vec<MissingItem> {
        self.checklist
            .iter()
            .flat_map(|section| {
                section
                    .items
                    .iter()
                    .filter(|item| item.required && !item.done)
                    .map(|item| MissingItem { id: item.id, category: section.category.clone(), text: item.text.clone() })
            })
            .collect()
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        let mut total = 0;
        let mut done = 0;
        let mut required_total = 0;
        let mut required_done = 0;
        let mut categories = Vec::with_capacity(self.checklist.len());

        for section in &self.checklist {
            let section_done = section.items.iter().filter(|item| item.done).count();
            total += section.items.len();
            done += section_done;
            required_total += section.items.iter().filter(|item| item.required).count();
            required_done += section
                .items
                .iter()
                .filter(|item| item.required && item.done)
                .count();
            categories.push(CategoryProgress {
                category: section.category.clone(),
                total: section.items.len(),
                done: section_done,
                percent: percent(section_done, section.items.len()),
            });
        }

        Progress {
            total,
            done,
            percent: percent(done, total),
            required_total,
            required_done,
            // Nothing required means nothing blocks submission.
            required_percent: if required_total == 0 { 100 } else { percent(required_done, required_total) },
            categories,
        }
    }

    #[must_use]
    pub fn photo_count(&self) -> usize {
        self.checklist
            .iter()
            .flat_map(|section| section.items.iter())
            .map(|item| item.photo_urls.len())
            .sum()
    }

    #[must_use]
    pub fn summary(&self, now: i64) -> CheckSummary {
        let missing_required = self.missing_required();
        let notes_count = self
            .checklist
            .iter()
            .flat_map(|section| section.items.iter())
            .filter(|item| !item.notes.trim().is_empty())
            .count();
        CheckSummary {
            id: self.id,
            property_id: self.property_id,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            elapsed_seconds: self.elapsed_seconds_at(now),
            progress: self.progress(),
            can_submit: self.status == CheckStatus::InProgress && missing_required.is_empty(),
            missing_required,
            photo_count: self.photo_count(),
            notes_count,
            general_notes: self.general_notes.clone(),
            weather: self.weather.clone(),
            condition: self.condition,
        }
    }
}

/// Rounded integer percentage; 0 when `total` is 0.
#[must_use]
pub fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (done.min(total) * 100 + total / 2) / total;
    u32::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
#[path = "checklist_test.rs"]
mod tests;
