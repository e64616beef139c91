use serde::{Deserialize, Serialize};

use crate::indicators::trend::last_classified_index;

/// Computed rows aligned 1:1 with the bars an indicator was run over.
///
/// Only the rows are stored; each row type carries its own date so a frame
/// can be trimmed without losing alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorFrame<R> {
    pub rows: Vec<R>,
}

impl<R> IndicatorFrame<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent row.
    pub fn last(&self) -> Option<&R> {
        self.rows.last()
    }

    /// Most recent row that can carry a trend classification (one before
    /// the last, since the last row has no look-ahead yet).
    pub fn last_classified(&self) -> Option<&R> {
        last_classified_index(self.rows.len()).and_then(|i| self.rows.get(i))
    }

    /// Keep only the most recent `count` rows.
    pub fn into_tail(mut self, count: usize) -> Self {
        let start = self.rows.len().saturating_sub(count);
        self.rows.drain(..start);
        self
    }
}
