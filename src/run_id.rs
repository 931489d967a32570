//! Run identifiers embedded in artifact file names

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Local};
use rand::Rng;

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Identifier for one production run.
///
/// Format: `YYYYMMDD_HHMMSS-<seq>-<hex>`. The timestamp keeps names sortable,
/// the process-wide sequence separates runs started in the same second and
/// the random suffix separates processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh id stamped with the current local time
    #[must_use]
    pub fn generate() -> Self {
        Self::at(Local::now())
    }

    /// Generate an id for a given instant
    #[must_use]
    pub fn at(now: DateTime<Local>) -> Self {
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let suffix: u16 = rand::thread_rng().gen();
        Self(format!(
            "{}-{seq:04}-{suffix:04x}",
            now.format("%Y%m%d_%H%M%S")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
