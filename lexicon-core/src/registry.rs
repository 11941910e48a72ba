//! Term registry: fiber optic terms and the Arabic roots they hang on.

use std::fmt;
use thiserror::Error;

/// A term paired with its triliteral root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    /// The technical term, e.g. "Attenuation".
    pub term: String,
    /// Hyphen-separated root consonants, e.g. "T-W-H-N".
    pub root: String,
    /// Literal meaning of the root.
    pub root_meaning: String,
    /// Undiacritized Arabic rendering of the term.
    pub arabic: String,
}

/// The four user-facing fields of a [`TermEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Term,
    Root,
    RootMeaning,
    Arabic,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Term => "term",
            Field::Root => "root",
            Field::RootMeaning => "root meaning",
            Field::Arabic => "Arabic script",
        })
    }
}

/// Input rejected before any backend is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<Field>),

    #[error("image provider {0} is not configured")]
    ProviderNotConfigured(String),
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl TermEntry {
    /// Create an entry from user-supplied fields.
    pub fn new(
        term: impl Into<String>,
        root: impl Into<String>,
        root_meaning: impl Into<String>,
        arabic: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            root: root.into(),
            root_meaning: root_meaning.into(),
            arabic: arabic.into(),
        }
    }

    /// Fields that are empty or whitespace-only.
    pub fn missing_fields(&self) -> Vec<Field> {
        [
            (Field::Term, &self.term),
            (Field::Root, &self.root),
            (Field::RootMeaning, &self.root_meaning),
            (Field::Arabic, &self.arabic),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Check that every field is populated.
    ///
    /// Script correctness and root plausibility are not checked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }
}

/// (term, root, root meaning, Arabic)
const TERM_ROOTS: &[(&str, &str, &str, &str)] = &[
    ("Insertion Loss", "F-Q-D", "To lose/miss", "فقد الإدخال"),
    ("Splicing", "L-H-M", "Meat/Welding", "لحام"),
    ("Fiber Optics", "L-Y-F", "Natural fiber/Loofah", "الألياف البصرية"),
    ("Attenuation", "T-W-H-N", "To weaken", "توهين"),
    ("OTDR Device", "F-H-S", "To examine", "جهاز فحص الألياف"),
    ("Trace (Graph)", "R-S-M", "To draw", "رسم بياني"),
];

/// Look up a registry term by exact name.
pub fn lookup(term: &str) -> Option<TermEntry> {
    TERM_ROOTS
        .iter()
        .find(|(name, ..)| *name == term)
        .map(|&(term, root, meaning, arabic)| TermEntry::new(term, root, meaning, arabic))
}

/// Registry terms in display order.
pub fn terms() -> impl Iterator<Item = &'static str> {
    TERM_ROOTS.iter().map(|(term, ..)| *term)
}

/// Every registry entry in display order.
pub fn entries() -> impl Iterator<Item = TermEntry> {
    TERM_ROOTS
        .iter()
        .map(|&(term, root, meaning, arabic)| TermEntry::new(term, root, meaning, arabic))
}
