use std::fmt;
use std::str::FromStr;

use crate::error::UpdateError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, UpdateError> {
        let owner = owner.into();
        let name = name.into();
        validate_segment(&owner, "owner")?;
        validate_segment(&name, "name")?;
        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepositoryId {
    type Err = UpdateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_matches('/');
        let (owner, name) = trimmed.split_once('/').ok_or_else(|| {
            UpdateError::Config(format!(
                "invalid repository '{value}': expected owner/repo"
            ))
        })?;
        Self::new(owner, name)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn validate_segment(value: &str, field: &str) -> Result<(), UpdateError> {
    if value.is_empty() {
        return Err(UpdateError::Config(format!(
            "invalid repository {field}: must not be empty"
        )));
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    {
        return Err(UpdateError::Config(format!(
            "invalid repository {field} '{value}': use ASCII letters, digits, '-', '_' or '.'"
        )));
    }
    Ok(())
}
