// ============================================================================
// MODELS - Reflection records, frameworks and their field schemas
// ============================================================================

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage format for `ReflectionRecord::date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Label shown for records whose framework is no longer known.
pub const UNKNOWN_FRAMEWORK_LABEL: &str = "Unknown framework";

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionRecord {
    pub id: String,
    pub owner: String,
    pub framework_id: String,
    /// Field id -> text. Display order comes from the framework schema.
    pub content: HashMap<String, String>,
    /// The day the reflection is about (`YYYY-MM-DD`), not when it was written.
    pub date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReflectionRecord {
    /// Parsed `date`, or `None` when the stored string is malformed.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }

    /// Content in schema order as `(label, value)` pairs.
    ///
    /// Without a framework the raw keys are used, sorted so the output is stable.
    pub fn ordered_content(&self, framework: Option<&Framework>) -> Vec<(String, String)> {
        match framework {
            Some(fw) => fw
                .ordered_fields()
                .into_iter()
                .filter_map(|field| {
                    self.content
                        .get(&field.id)
                        .map(|value| (field.label.clone(), value.clone()))
                })
                .collect(),
            None => {
                let mut pairs: Vec<(String, String)> = self
                    .content
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                pairs
            }
        }
    }
}

/// One input definition within a framework's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkField {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl FrameworkField {
    fn new(id: &str, label: &str, placeholder: &str, order: i32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            placeholder: placeholder.to_string(),
            order: Some(order),
            required: false,
            max_length: None,
        }
    }

    fn sort_key(&self) -> i32 {
        self.order.unwrap_or(i32::MAX)
    }
}

/// A reflection template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub icon: String,
    /// `#RRGGBB`
    pub color: String,
    pub schema: Vec<FrameworkField>,
    pub is_active: bool,
}

impl Framework {
    /// Fields sorted by `order`; missing orders go last, ties keep schema order.
    pub fn ordered_fields(&self) -> Vec<&FrameworkField> {
        let mut fields: Vec<&FrameworkField> = self.schema.iter().collect();
        fields.sort_by_key(|f| f.sort_key());
        fields
    }
}

pub fn find_framework<'a>(frameworks: &'a [Framework], id: &str) -> Option<&'a Framework> {
    frameworks.iter().find(|f| f.id == id)
}

/// Label for a framework id, falling back for unknown ids.
pub fn framework_label(frameworks: &[Framework], id: &str) -> String {
    find_framework(frameworks, id)
        .map(|f| f.display_name.clone())
        .unwrap_or_else(|| UNKNOWN_FRAMEWORK_LABEL.to_string())
}

/// Frameworks seeded into a fresh store.
pub fn builtin_frameworks() -> Vec<Framework> {
    vec![
        Framework {
            id: "ywt".to_string(),
            name: "YWT".to_string(),
            display_name: "Yatta-Wakatta-Tsugiwa".to_string(),
            description: "What you did, what you learned, what comes next.".to_string(),
            icon: "Y".to_string(),
            color: "#3B82F6".to_string(),
            schema: vec![
                FrameworkField::new("y", "Yatta (what I did)", "Things I worked on today", 1),
                FrameworkField::new("w", "Wakatta (what I learned)", "Insights and discoveries", 2),
                FrameworkField::new("t", "Tsugiwa (what's next)", "What I will try next", 3),
            ],
            is_active: true,
        },
        Framework {
            id: "kpt".to_string(),
            name: "KPT".to_string(),
            display_name: "Keep-Problem-Try".to_string(),
            description: "What to keep, what went wrong, what to try.".to_string(),
            icon: "K".to_string(),
            color: "#10B981".to_string(),
            schema: vec![
                FrameworkField::new("keep", "Keep", "What went well and should continue", 1),
                FrameworkField::new("problem", "Problem", "What got in the way", 2),
                FrameworkField::new("try", "Try", "What to experiment with next", 3),
            ],
            is_active: true,
        },
        Framework {
            id: "4ls".to_string(),
            name: "4Ls".to_string(),
            display_name: "Liked-Learned-Lacked-Longed for".to_string(),
            description: "Four angles on a period of work.".to_string(),
            icon: "4".to_string(),
            color: "#F59E0B".to_string(),
            schema: vec![
                FrameworkField::new("liked", "Liked", "What you enjoyed", 1),
                FrameworkField::new("learned", "Learned", "What you learned", 2),
                FrameworkField::new("lacked", "Lacked", "What was missing", 3),
                FrameworkField::new("longed_for", "Longed for", "What you wished for", 4),
            ],
            is_active: true,
        },
    ]
}
