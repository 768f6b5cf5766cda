//! Interactive index authoring.
//!
//! [`InteractiveSession`] holds no I/O: the driver feeds it one input line at a time and acts
//! on the returned [`Step`]. This keeps every prompt transition testable without a terminal.

use crate::core::index::{IndexDescriptor, IndexDirection, KeyPattern, ID_INDEX_NAME};
use crate::core::reconcile::CustomIndexSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitCollectionName,
    AwaitFieldSpec,
    AwaitOptions,
    AwaitConfirmation,
    AwaitSaveChoice,
    AwaitContinue,
}

/// What the driver should do after a line was fed.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Moved on, nothing to do but show the next prompt.
    Prompt,
    /// Input rejected; the state did not change.
    Invalid(String),
    Create(CustomIndexSpec),
    Save(CustomIndexSpec),
    Finished,
}

#[derive(Debug, Clone)]
pub struct InteractiveSession {
    state: SessionState,
    collection: Option<String>,
    key: Option<KeyPattern>,
    draft: Option<CustomIndexSpec>,
    finished: bool,
}

impl Default for InteractiveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractiveSession {
    pub fn new() -> Self {
        Self { state: SessionState::AwaitCollectionName, collection: None, key: None, draft: None, finished: false }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn prompt(&self) -> String {
        match self.state {
            SessionState::AwaitCollectionName => "Collection name: ".to_string(),
            SessionState::AwaitFieldSpec => {
                "Index fields (field:direction, comma separated, e.g. email:1,created_at:-1): ".to_string()
            }
            SessionState::AwaitOptions => {
                "Options (unique, sparse, background, ttl=<seconds>, name=<name>; blank for none): ".to_string()
            }
            SessionState::AwaitConfirmation => match &self.draft {
                Some(spec) => format!("Create {} on {}? [y/n]: ", spec.index, spec.collection),
                None => "Create this index? [y/n]: ".to_string(),
            },
            SessionState::AwaitSaveChoice => "Save this index to the configuration? [y/n]: ".to_string(),
            SessionState::AwaitContinue => "Define another index? [y/n]: ".to_string(),
        }
    }

    pub fn feed(&mut self, line: &str) -> Step {
        if self.finished {
            return Step::Finished;
        }
        let line = line.trim();

        match self.state {
            SessionState::AwaitCollectionName => match validate_collection_name(line) {
                Ok(()) => {
                    self.collection = Some(line.to_string());
                    self.state = SessionState::AwaitFieldSpec;
                    Step::Prompt
                }
                Err(message) => Step::Invalid(message),
            },
            SessionState::AwaitFieldSpec => match parse_field_spec(line) {
                Ok(key) => {
                    self.key = Some(key);
                    self.state = SessionState::AwaitOptions;
                    Step::Prompt
                }
                Err(message) => Step::Invalid(message),
            },
            SessionState::AwaitOptions => {
                let (Some(collection), Some(key)) = (self.collection.clone(), self.key.clone()) else {
                    self.reset();
                    return Step::Invalid("session lost its draft, starting over".to_string());
                };
                match parse_options(line, key) {
                    Ok(index) => {
                        self.draft = Some(CustomIndexSpec::new(collection, index));
                        self.state = SessionState::AwaitConfirmation;
                        Step::Prompt
                    }
                    Err(message) => Step::Invalid(message),
                }
            }
            SessionState::AwaitConfirmation => match parse_yes_no(line) {
                Some(create) => {
                    self.state = SessionState::AwaitSaveChoice;
                    match (&self.draft, create) {
                        (Some(spec), true) => Step::Create(spec.clone()),
                        _ => Step::Prompt,
                    }
                }
                None => Step::Invalid(yes_no_hint()),
            },
            SessionState::AwaitSaveChoice => match parse_yes_no(line) {
                Some(save) => {
                    self.state = SessionState::AwaitContinue;
                    match (self.draft.take(), save) {
                        (Some(spec), true) => Step::Save(spec),
                        _ => Step::Prompt,
                    }
                }
                None => Step::Invalid(yes_no_hint()),
            },
            SessionState::AwaitContinue => match parse_yes_no(line) {
                Some(true) => {
                    self.reset();
                    Step::Prompt
                }
                Some(false) => {
                    self.finished = true;
                    Step::Finished
                }
                None => Step::Invalid(yes_no_hint()),
            },
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::AwaitCollectionName;
        self.collection = None;
        self.key = None;
        self.draft = None;
    }
}

fn yes_no_hint() -> String {
    "please answer y or n".to_string()
}

pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn validate_collection_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("collection name must not be empty".to_string());
    }
    if name.contains('$') || name.contains('\0') {
        return Err(format!("invalid collection name `{}`", name));
    }
    if name.starts_with("system.") {
        return Err("system collections cannot be indexed from here".to_string());
    }
    Ok(())
}

/// `email:1,created_at:-1` style key pattern.
pub fn parse_field_spec(input: &str) -> Result<KeyPattern, String> {
    let mut fields: Vec<(String, IndexDirection)> = Vec::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let Some((field, direction)) = part.rsplit_once(':') else {
            return Err(format!("`{}` is not field:direction", part));
        };
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("`{}` has no field name", part));
        }
        if fields.iter().any(|(existing, _)| existing == field) {
            return Err(format!("field `{}` listed twice", field));
        }
        fields.push((field.to_string(), direction.parse()?));
    }
    KeyPattern::new(fields).map_err(|_| "at least one field:direction is required".to_string())
}

/// Comma separated option tokens applied to a fresh descriptor for `key`.
pub fn parse_options(input: &str, key: KeyPattern) -> Result<IndexDescriptor, String> {
    let mut index = IndexDescriptor::new(key);
    for token in input.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        match token.split_once('=').map(|(option, value)| (option.trim(), value.trim())) {
            None => match token.to_ascii_lowercase().as_str() {
                "unique" => index.unique = true,
                "sparse" => index.sparse = true,
                "background" => index.background = true,
                other => return Err(format!("unknown option `{}`", other)),
            },
            Some(("ttl", seconds)) => {
                let parsed =
                    seconds.parse::<u64>().map_err(|_| format!("ttl must be whole seconds, got `{}`", seconds))?;
                index.expire_after_seconds = Some(parsed);
            }
            Some(("name", name)) if name == ID_INDEX_NAME => return Err(format!("`{}` is reserved", ID_INDEX_NAME)),
            Some(("name", "")) => return Err("name must not be empty".to_string()),
            Some(("name", name)) => index.name = name.to_string(),
            Some((option, _)) => return Err(format!("unknown option `{}`", option)),
        }
    }
    Ok(index)
}
