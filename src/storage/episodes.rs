use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{DatabaseError, Episode, EpisodeDbRow};

/// Rows per multi-row INSERT. 4 binds per row keeps us well under
/// SQLite's 999 parameter limit.
const BATCH_SIZE: usize = 100;

impl Database {
    // ========================================================================
    // Whole-table Operations
    // ========================================================================

    /// Load every stored episode in the order it was last written.
    pub async fn load_episodes(&self) -> Result<Vec<Episode>, DatabaseError> {
        let rows = sqlx::query_as::<_, EpisodeDbRow>(
            "SELECT title, start_time, recorded, url FROM episodes ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(EpisodeDbRow::into_episode).collect()
    }

    /// Replace the stored episode list with `episodes`, atomically.
    ///
    /// The table is written back wholesale: rows not in `episodes` are gone
    /// afterwards. `episodes` must be unique by title (the reconciled list is).
    pub async fn replace_episodes(&self, episodes: &[Episode]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query("DELETE FROM episodes")
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        for chunk in episodes.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO episodes (title, start_time, recorded, url) ");
            builder.push_values(chunk, |mut b, episode| {
                b.push_bind(&episode.title)
                    .push_bind(episode.start_time.timestamp())
                    .push_bind(episode.recorded)
                    .push_bind(&episode.url);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        tracing::debug!(count = episodes.len(), "Episode table rewritten");
        Ok(())
    }

    // ========================================================================
    // Presentation Queries
    // ========================================================================

    /// Episodes starting strictly after `after`, nearest broadcast first.
    pub async fn upcoming_episodes(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<Episode>, DatabaseError> {
        let rows = sqlx::query_as::<_, EpisodeDbRow>(
            r#"
            SELECT title, start_time, recorded, url
            FROM episodes
            WHERE start_time > ?
            ORDER BY start_time ASC, title ASC
        "#,
        )
        .bind(after.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(EpisodeDbRow::into_episode).collect()
    }

    /// Set the user-maintained recorded flag. Returns false when no episode
    /// has that title.
    pub async fn set_recorded(&self, title: &str, recorded: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE episodes SET recorded = ? WHERE title = ?")
            .bind(recorded)
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn episode(title: &str, day: u32, recorded: bool) -> Episode {
        Episode {
            title: title.to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 5, day, 21, 0, 0).unwrap(),
            recorded,
            url: format!("https://tv.example.com/detail/{title}"),
        }
    }

    #[tokio::test]
    async fn test_empty_database_loads_nothing() {
        let db = test_db().await;
        assert!(db.load_episodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_then_load_preserves_write_order() {
        let db = test_db().await;
        let episodes = vec![episode("B", 3, false), episode("A", 1, true)];

        db.replace_episodes(&episodes).await.unwrap();

        assert_eq!(db.load_episodes().await.unwrap(), episodes);
    }

    #[tokio::test]
    async fn test_replace_drops_rows_not_in_new_list() {
        let db = test_db().await;
        db.replace_episodes(&[episode("Old", 1, false), episode("Kept", 2, true)])
            .await
            .unwrap();

        db.replace_episodes(&[episode("Kept", 2, true)]).await.unwrap();

        let titles: Vec<_> = db
            .load_episodes()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Kept".to_string()]);
    }

    #[tokio::test]
    async fn test_replace_with_more_rows_than_one_batch() {
        let db = test_db().await;
        let episodes: Vec<_> = (0..(BATCH_SIZE + 7))
            .map(|i| episode(&format!("Ep {i}"), 1 + (i % 28) as u32, false))
            .collect();

        db.replace_episodes(&episodes).await.unwrap();

        assert_eq!(db.load_episodes().await.unwrap().len(), BATCH_SIZE + 7);
    }

    #[tokio::test]
    async fn test_upcoming_is_sorted_and_cut_off() {
        let db = test_db().await;
        db.replace_episodes(&[
            episode("Late", 9, false),
            episode("Past", 1, false),
            episode("Soon", 5, false),
        ])
        .await
        .unwrap();

        let cutoff = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let titles: Vec<_> = db
            .upcoming_episodes(cutoff)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Soon".to_string(), "Late".to_string()]);
    }

    #[tokio::test]
    async fn test_set_recorded_updates_flag() {
        let db = test_db().await;
        db.replace_episodes(&[episode("A", 1, false)]).await.unwrap();

        assert!(db.set_recorded("A", true).await.unwrap());
        assert!(db.load_episodes().await.unwrap()[0].recorded);

        assert!(db.set_recorded("A", false).await.unwrap());
        assert!(!db.load_episodes().await.unwrap()[0].recorded);
    }

    #[tokio::test]
    async fn test_set_recorded_unknown_title() {
        let db = test_db().await;
        assert!(!db.set_recorded("Missing", true).await.unwrap());
    }
}
