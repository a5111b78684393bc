// ============================================================================
// JOURNAL - Local record cache, editable drafts and the save flow
// ============================================================================
//
// Saving updates the local list before the store confirms. A failed write
// rolls the local list back; the draft the user is typing into is never
// touched by the save attempt.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::models::{DATE_FORMAT, Framework, ReflectionRecord, find_framework};
use crate::store::{NewRecord, ReflectionStore, StoreError};
use crate::validation::{ValidationResult, sanitize_form, validate_form};

/// Editable form state for one reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub framework_id: String,
    pub date: NaiveDate,
    pub values: HashMap<String, String>,
    /// Set when editing an existing record.
    pub record_id: Option<String>,
}

impl Draft {
    pub fn new(framework: &Framework, date: NaiveDate) -> Self {
        Self {
            framework_id: framework.id.clone(),
            date,
            values: framework
                .schema
                .iter()
                .map(|f| (f.id.clone(), String::new()))
                .collect(),
            record_id: None,
        }
    }

    pub fn from_record(record: &ReflectionRecord, date: NaiveDate) -> Self {
        Self {
            framework_id: record.framework_id.clone(),
            date,
            values: record.content.clone(),
            record_id: Some(record.id.clone()),
        }
    }
}

/// Indicator shown next to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Saved {
    pub record: ReflectionRecord,
    pub created: bool,
}

#[derive(Debug)]
pub enum SaveFailed {
    Invalid(ValidationResult),
    UnknownFramework(String),
    Store(StoreError),
}

impl std::fmt::Display for SaveFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(result) => write!(f, "{} field(s) need attention", result.errors.len()),
            Self::UnknownFramework(id) => write!(f, "unknown framework: {id}"),
            Self::Store(e) => write!(f, "could not save: {e}"),
        }
    }
}

pub struct Journal {
    owner: String,
    frameworks: Vec<Framework>,
    records: Vec<ReflectionRecord>,
    pub status: SaveStatus,
}

impl Journal {
    pub fn load(store: &dyn ReflectionStore, owner: &str) -> Result<Self, StoreError> {
        let frameworks = store.list_frameworks()?;
        let records = store.list_records(owner)?;
        info!("Loaded {} reflections for {}", records.len(), owner);
        Ok(Self {
            owner: owner.to_string(),
            frameworks,
            records,
            status: SaveStatus::Idle,
        })
    }

    pub fn frameworks(&self) -> &[Framework] {
        &self.frameworks
    }

    pub fn active_frameworks(&self) -> Vec<&Framework> {
        self.frameworks.iter().filter(|f| f.is_active).collect()
    }

    pub fn framework(&self, id: &str) -> Option<&Framework> {
        find_framework(&self.frameworks, id)
    }

    pub fn records(&self) -> &[ReflectionRecord] {
        &self.records
    }

    pub fn record(&self, id: &str) -> Option<&ReflectionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records_on(&self, date: NaiveDate) -> Vec<&ReflectionRecord> {
        self.records
            .iter()
            .filter(|r| r.parsed_date() == Some(date))
            .collect()
    }

    /// Validate, sanitize and persist `draft`.
    pub fn save(&mut self, store: &mut dyn ReflectionStore, draft: &Draft) -> Result<Saved, SaveFailed> {
        let framework = match self.framework(&draft.framework_id) {
            Some(fw) => fw.clone(),
            None => {
                self.status = SaveStatus::Failed("unknown framework".to_string());
                return Err(SaveFailed::UnknownFramework(draft.framework_id.clone()));
            }
        };

        // Content keys are exactly the schema field ids; anything else is dropped.
        let values: HashMap<String, String> = framework
            .schema
            .iter()
            .map(|field| {
                let value = draft.values.get(&field.id).cloned().unwrap_or_default();
                (field.id.clone(), value)
            })
            .collect();

        let validation = validate_form(&values, &framework.schema);
        if !validation.is_valid {
            self.status = SaveStatus::Idle;
            return Err(SaveFailed::Invalid(validation));
        }
        let content = sanitize_form(&values);
        let date = draft.date.format(DATE_FORMAT).to_string();

        self.status = SaveStatus::Saving;
        let snapshot = self.records.clone();
        let optimistic_id = self.apply_optimistic(draft, &content, &date);

        let result = match &draft.record_id {
            Some(id) => store
                .update_record(id, &self.owner, content)
                .map(|record| Saved { record, created: false }),
            None => store
                .create_record(NewRecord {
                    owner: self.owner.clone(),
                    framework_id: framework.id.clone(),
                    date,
                    content,
                })
                .map(|record| Saved { record, created: true }),
        };

        match result {
            Ok(saved) => {
                if let Some(slot) = self.records.iter_mut().find(|r| r.id == optimistic_id) {
                    *slot = saved.record.clone();
                }
                self.status = SaveStatus::Saved;
                Ok(saved)
            }
            Err(e) => {
                warn!("Save failed, rolling back local change: {}", e);
                self.records = snapshot;
                self.status = SaveStatus::Failed(e.to_string());
                Err(SaveFailed::Store(e))
            }
        }
    }

    /// Put the pending version of the record in the local list; returns its id.
    fn apply_optimistic(&mut self, draft: &Draft, content: &HashMap<String, String>, date: &str) -> String {
        let now = Utc::now();
        if let Some(id) = &draft.record_id {
            if let Some(record) = self.records.iter_mut().find(|r| &r.id == id) {
                record.content = content.clone();
                record.updated_at = now;
            }
            return id.clone();
        }
        let pending_id = format!("pending-{}", uuid::Uuid::new_v4());
        self.records.insert(
            0,
            ReflectionRecord {
                id: pending_id.clone(),
                owner: self.owner.clone(),
                framework_id: draft.framework_id.clone(),
                content: content.clone(),
                date: date.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        pending_id
    }

    /// Remove a record after the user confirmed.
    pub fn delete(&mut self, store: &mut dyn ReflectionStore, id: &str) -> Result<(), StoreError> {
        store.delete_record(id, &self.owner)?;
        self.records.retain(|r| r.id != id);
        Ok(())
    }
}
