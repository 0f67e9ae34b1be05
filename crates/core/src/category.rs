//! Categories grouping maps.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Categories seeded by the setup script.
pub const DEFAULT_CATEGORIES: [&str; 6] = [
    "Plantio",
    "Colheita",
    "Irrigação",
    "Fertilização",
    "Monitoramento",
    "Outros",
];

/// Unique identifier for a category.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(Uuid);

impl CategoryId {
    /// Generate a new random category ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| crate::Error::InvalidId(format!("invalid category ID {s:?}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CategoryId({})", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-defined label grouping maps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "criado_em", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Validate a category name against the existing set.
///
/// Returns the trimmed name. Uniqueness is case-insensitive; `exclude`
/// skips the category being renamed so it can keep (or re-case) its own
/// name.
pub fn validate_category_name(
    name: &str,
    existing: &[Category],
    exclude: Option<CategoryId>,
) -> crate::Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::Required {
            field: "category name",
        });
    }

    let lowered = trimmed.to_lowercase();
    let duplicate = existing
        .iter()
        .filter(|c| Some(c.id) != exclude)
        .any(|c| c.name.trim().to_lowercase() == lowered);
    if duplicate {
        return Err(crate::Error::DuplicateCategory(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}
