//! Record id generation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SimError;

/// How a collection assigns ids to records created without one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdStrategy {
    /// Random v4 UUID (hyphenated)
    #[default]
    Uuid,
    /// Next integer after the highest numeric suffix in use
    Sequential {
        #[serde(default)]
        prefix: String,
        /// Zero-pad the number to this many digits
        #[serde(default)]
        width: usize,
    },
    /// `{prefix}/{uuid}` resource names, e.g. `spaces/3f2a...`
    ResourceName { prefix: String },
}

impl IdStrategy {
    /// Generates the next id given the ids already present in the collection.
    ///
    /// # Returns
    /// `Err(SimError::InvalidInput)` when a sequential suffix is already `u64::MAX`.
    pub fn next_id<'a, I>(&self, existing: I) -> Result<String, SimError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            IdStrategy::Uuid => Ok(Uuid::new_v4().to_string()),
            IdStrategy::ResourceName { prefix } => Ok(format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                Uuid::new_v4().simple()
            )),
            IdStrategy::Sequential { prefix, width } => {
                let highest = existing
                    .into_iter()
                    .filter_map(|id| id.strip_prefix(prefix.as_str()))
                    .filter_map(|suffix| suffix.parse::<u64>().ok())
                    .max();
                let next = match highest {
                    None => 1,
                    Some(max) => max.checked_add(1).ok_or_else(|| {
                        SimError::InvalidInput(format!(
                            "Sequential ids with prefix '{}' are exhausted",
                            prefix
                        ))
                    })?,
                };
                Ok(format!("{}{:0width$}", prefix, next, width = *width))
            }
        }
    }
}
