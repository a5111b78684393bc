// ============================================================================
// VALIDATION & SANITIZATION - Field rules, form checks, markup stripping
// ============================================================================
//
// Validation decides whether a form may be submitted; sanitization cleans
// values that already passed. Both run on save and neither replaces the other.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::models::FrameworkField;

/// Limit applied when a field does not declare `max_length`.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Error key for problems that belong to the whole form, not one field.
pub const FORM_ERROR_KEY: &str = "_form";

const NO_FIELD_FILLED_MESSAGE: &str = "Please fill in at least one field.";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:/?[A-Za-z][^<>]*|!--[\s\S]*?--)>").expect("valid tag pattern")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid script pattern")
});

// C0 controls and DEL, minus LF and CR.
static FORBIDDEN_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x09\x0B\x0C\x0E-\x1F\x7F]").expect("valid control pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    Required,
    MaxLength { limit: usize },
    ContainsHtml,
    ContainsForbiddenChars,
    NoFieldFilled,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "This field is required."),
            Self::MaxLength { limit } => write!(f, "Must be {limit} characters or fewer."),
            Self::ContainsHtml => write!(f, "HTML tags are not allowed."),
            Self::ContainsForbiddenChars => write!(f, "Contains characters that are not allowed."),
            Self::NoFieldFilled => write!(f, "{NO_FIELD_FILLED_MESSAGE}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field id, or [`FORM_ERROR_KEY`] for form-level errors.
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, kind: ValidationErrorKind) -> Self {
        Self {
            field: field.to_string(),
            message: kind.to_string(),
            kind,
        }
    }

    pub fn is_form_level(&self) -> bool {
        self.field == FORM_ERROR_KEY
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn errors_for(&self, field_id: &str) -> impl Iterator<Item = &FieldError> {
        let field_id = field_id.to_string();
        self.errors.iter().filter(move |e| e.field == field_id)
    }

    pub fn form_error(&self) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.is_form_level())
    }
}

/// User-perceived character count.
pub fn grapheme_len(value: &str) -> usize {
    value.graphemes(true).count()
}

pub fn contains_html(value: &str) -> bool {
    HTML_TAG.is_match(value)
}

pub fn contains_forbidden_chars(value: &str) -> bool {
    FORBIDDEN_CHARS.is_match(value)
}

/// Check one value. Rules run in order and stop at the first failure.
pub fn validate_field(
    field_id: &str,
    value: &str,
    required: bool,
    max_length: usize,
) -> Option<FieldError> {
    if required && value.trim().is_empty() {
        return Some(FieldError::new(field_id, ValidationErrorKind::Required));
    }
    if value.is_empty() {
        return None;
    }
    if grapheme_len(value) > max_length {
        return Some(FieldError::new(
            field_id,
            ValidationErrorKind::MaxLength { limit: max_length },
        ));
    }
    if contains_html(value) {
        return Some(FieldError::new(field_id, ValidationErrorKind::ContainsHtml));
    }
    if contains_forbidden_chars(value) {
        return Some(FieldError::new(
            field_id,
            ValidationErrorKind::ContainsForbiddenChars,
        ));
    }
    None
}

/// Validate every schema field and collect all errors.
///
/// Also fails with a form-level error when nothing in `values` has
/// non-whitespace content, whatever the per-field `required` flags say.
pub fn validate_form(values: &HashMap<String, String>, schema: &[FrameworkField]) -> ValidationResult {
    let mut errors: Vec<FieldError> = schema
        .iter()
        .filter_map(|field| {
            let value = values.get(&field.id).map(String::as_str).unwrap_or("");
            validate_field(
                &field.id,
                value,
                field.required,
                field.max_length.unwrap_or(DEFAULT_MAX_LENGTH),
            )
        })
        .collect();

    if !values.values().any(|v| !v.trim().is_empty()) {
        errors.push(FieldError::new(FORM_ERROR_KEY, ValidationErrorKind::NoFieldFilled));
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Strip every tag (script and style bodies included) and trim.
pub fn sanitize_field(value: &str) -> String {
    let mut current = value.to_string();
    // Removing one tag can join the halves of another, so run to a fixpoint.
    loop {
        let without_blocks = SCRIPT_OR_STYLE.replace_all(&current, "");
        let stripped = HTML_TAG.replace_all(&without_blocks, "").into_owned();
        if stripped == current {
            break;
        }
        current = stripped;
    }
    current.trim().to_string()
}

pub fn normalize_line_breaks(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n")
}

/// Sanitize every value and normalize line breaks to LF.
pub fn sanitize_form(values: &HashMap<String, String>) -> HashMap<String, String> {
    values
        .iter()
        .map(|(key, value)| (key.clone(), sanitize_field(&normalize_line_breaks(value))))
        .collect()
}
