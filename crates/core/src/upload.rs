//! Upload queue status and batch planning.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

/// Status of one file in the upload queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Waiting for the next batch run.
    Pending,
    /// An attempt is in flight.
    Uploading,
    /// Stored and recorded.
    Success,
    /// Gave up after the last attempt.
    Error,
}

impl UploadStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Check if the entry reached a terminal state for the current run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// How a run of `total` files is split into batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    pub total: usize,
    pub batch_size: usize,
    pub pause: Duration,
}

impl BatchPlan {
    /// Batch size 5 above 100 files, 8 above 50, 10 otherwise.
    /// The pause between batches is 2s above 100 files, 500ms otherwise.
    pub fn for_total(total: usize) -> Self {
        let batch_size = if total > 100 {
            5
        } else if total > 50 {
            8
        } else {
            10
        };
        let pause = if total > 100 {
            Duration::from_millis(2000)
        } else {
            Duration::from_millis(500)
        };
        Self {
            total,
            batch_size,
            pause,
        }
    }

    /// Number of batches.
    pub fn batch_count(&self) -> usize {
        self.total.div_ceil(self.batch_size)
    }

    /// Index ranges of each batch, in order.
    pub fn batches(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.total)
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(self.total))
    }

    /// Number of pauses taken during a full run.
    pub fn pause_count(&self) -> usize {
        self.batch_count().saturating_sub(1)
    }
}
