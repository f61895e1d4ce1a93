//! Per-template render counters for one process.

use std::collections::BTreeMap;

use crate::error::CatcherError;

/// Render count per template identifier.
///
/// The key set is fixed at construction; counts only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageRegistry {
    counts: BTreeMap<String, u64>,
    total: u64,
}

impl UsageRegistry {
    /// Create a registry with every template at zero renders
    pub fn new<I, S>(template_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counts: template_ids.into_iter().map(|id| (id.into(), 0)).collect(),
            total: 0,
        }
    }

    /// Count one render of `template_id`.
    ///
    /// Unknown ids leave the registry untouched.
    pub fn record_render(&mut self, template_id: &str) -> Result<(), CatcherError> {
        let count =
            self.counts
                .get_mut(template_id)
                .ok_or_else(|| CatcherError::UnknownTemplate {
                    template: template_id.to_string(),
                })?;
        *count += 1;
        self.total += 1;
        Ok(())
    }

    /// Templates that were never rendered, ordered by id
    pub fn dead_entries(&self) -> BTreeMap<String, u64> {
        dead_entries(&self.counts)
    }

    /// Render count of a single template
    pub fn count(&self, template_id: &str) -> Option<u64> {
        self.counts.get(template_id).copied()
    }

    /// All counts, ordered by id
    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    /// Renders recorded since startup
    pub fn total_renders(&self) -> u64 {
        self.total
    }

    /// Number of tracked templates
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no template is tracked
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Entries of `stats` whose count is exactly zero
pub fn dead_entries(stats: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
    stats
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(id, _)| (id.clone(), 0))
        .collect()
}
