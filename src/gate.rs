//! Staleness gate between the feeds and the evaluation loop.

use time::OffsetDateTime;

/// Whether either feed produced data newer than the last evaluation.
///
/// `None` means "never": a feed that never updated is not newer than
/// anything, and a loop that never evaluated is older than any update.
pub fn is_stale(
    last_evaluated_at: Option<OffsetDateTime>,
    book_updated_at: Option<OffsetDateTime>,
    spot_updated_at: Option<OffsetDateTime>,
) -> bool {
    book_updated_at > last_evaluated_at || spot_updated_at > last_evaluated_at
}

/// Watermark of the data last evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessGate {
    last_evaluated_at: Option<OffsetDateTime>,
}

impl StalenessGate {
    /// Create a gate that has never evaluated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the feed timestamps against the watermark.
    pub fn is_stale(
        &self,
        book_updated_at: Option<OffsetDateTime>,
        spot_updated_at: Option<OffsetDateTime>,
    ) -> bool {
        is_stale(self.last_evaluated_at, book_updated_at, spot_updated_at)
    }

    /// Advance the watermark to the timestamps of the evaluated snapshots.
    pub fn mark_evaluated(
        &mut self,
        book_updated_at: Option<OffsetDateTime>,
        spot_updated_at: Option<OffsetDateTime>,
    ) -> Option<OffsetDateTime> {
        self.last_evaluated_at = self
            .last_evaluated_at
            .max(book_updated_at)
            .max(spot_updated_at);
        self.last_evaluated_at
    }

    /// Current watermark.
    pub fn last_evaluated_at(&self) -> Option<OffsetDateTime> {
        self.last_evaluated_at
    }
}
