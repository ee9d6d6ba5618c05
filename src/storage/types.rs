use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The episode database is locked by another process.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be turned back into an episode
    #[error("Corrupt episode row '{title}': {reason}")]
    CorruptRow { title: String, reason: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Episode
// ============================================================================

/// Display format for broadcast start times (`yyyy/MM/dd H:m:s`, UTC).
pub const START_TIME_FORMAT: &str = "%Y/%m/%d %-H:%-M:%-S";

/// One broadcast of the tracked show.
///
/// `title` is the normalized title and doubles as the dedup key. Only
/// `recorded` is user state; everything else is regenerated on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub recorded: bool,
    pub url: String,
}

impl Episode {
    /// Start time rendered in [`START_TIME_FORMAT`].
    pub fn display_start(&self) -> String {
        self.start_time.format(START_TIME_FORMAT).to_string()
    }
}

/// Internal row type for episode queries (used by sqlx FromRow).
/// `start_time` is stored as unix seconds.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EpisodeDbRow {
    pub title: String,
    pub start_time: i64,
    pub recorded: bool,
    pub url: String,
}

impl EpisodeDbRow {
    pub(crate) fn into_episode(self) -> Result<Episode, DatabaseError> {
        let start_time = DateTime::from_timestamp(self.start_time, 0).ok_or_else(|| {
            DatabaseError::CorruptRow {
                title: self.title.clone(),
                reason: format!("start_time {} out of range", self.start_time),
            }
        })?;
        Ok(Episode {
            title: self.title,
            start_time,
            recorded: self.recorded,
            url: self.url,
        })
    }
}
