//! Normalization of "index already exists" replies.
//!
//! The server has no single signal for "this exact index is already there", so the codes and
//! message fragments recognised are data on [`DuplicateIndexMatcher`], configurable from the
//! `duplicate_index` section of the configuration file.

use crate::core::client::database::DatabaseError;
use serde::{Deserialize, Serialize};

/// `IndexAlreadyExists`
pub const INDEX_ALREADY_EXISTS_CODE: i32 = 68;
/// `IndexOptionsConflict`: same key under another name, or same name with other options.
pub const INDEX_OPTIONS_CONFLICT_CODE: i32 = 85;
/// `IndexKeySpecsConflict`: same name with another key pattern.
pub const INDEX_KEY_SPECS_CONFLICT_CODE: i32 = 86;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateIndexMatcher {
    /// Error codes that always mean the index already exists.
    pub codes: Vec<i32>,
    /// Case-insensitive message fragments that mean the index already exists.
    pub message_patterns: Vec<String>,
    /// Error codes that never mean the index already exists, whatever the message says.
    pub conflict_codes: Vec<i32>,
}

impl Default for DuplicateIndexMatcher {
    fn default() -> Self {
        Self {
            codes: vec![INDEX_ALREADY_EXISTS_CODE],
            message_patterns: vec!["all indexes already exist".to_string(), "index already exists".to_string()],
            conflict_codes: vec![INDEX_OPTIONS_CONFLICT_CODE, INDEX_KEY_SPECS_CONFLICT_CODE],
        }
    }
}

impl DuplicateIndexMatcher {
    /// Whether a create failure means the requested index is already present.
    pub fn is_duplicate(&self, error: &DatabaseError) -> bool {
        if matches!(error, DatabaseError::IndexAlreadyExists(_)) {
            return true;
        }

        let code = error.code();
        if code.is_some_and(|code| self.conflict_codes.contains(&code)) {
            return false;
        }
        if code.is_some_and(|code| self.codes.contains(&code)) {
            return true;
        }

        let message = error.to_string().to_lowercase();
        self.message_patterns.iter().any(|pattern| message.contains(&pattern.to_lowercase()))
    }
}
