use std::time::Duration;

use super::client::{FetchError, RawEpisode, SearchApi};
use super::date::parse_broadcast_time;
use super::title::normalize_title;
use crate::storage::Episode;

/// Parameters of one paginated fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub keyword: String,
    pub channel: Option<String>,
    /// Ceiling on page requests, including the one that finds the end.
    pub max_pages: u32,
    /// Pause after every consumed page.
    pub page_delay: Duration,
    /// Detail links are `detail_base_url` followed by the record id.
    pub detail_base_url: String,
}

/// Fetches every guide record for `options.keyword`, page by page.
///
/// Pages are requested strictly one after another. The loop ends without
/// consuming the current page when the server total is non-positive, the
/// running offset has reached the total, or the page is empty; it also ends
/// after `max_pages` requests. Records come back in server order.
///
/// # Errors
///
/// Any request, decode or date error aborts the whole fetch. Nothing is
/// retried and no partial result is returned.
pub async fn fetch_episodes<A>(api: &A, options: &FetchOptions) -> Result<Vec<Episode>, FetchError>
where
    A: SearchApi + ?Sized,
{
    let mut episodes = Vec::new();
    let mut offset: i64 = 0;
    let mut page: u32 = 0;
    let mut consumed: u32 = 0;

    loop {
        page += 1;
        if page > options.max_pages {
            tracing::debug!(max_pages = options.max_pages, "Page ceiling reached");
            break;
        }

        let result = api
            .search_page(&options.keyword, options.channel.as_deref(), offset)
            .await?;
        let total = result.total_count;
        let count = result.count();

        if offset >= total || total <= 0 || count <= 0 {
            tracing::debug!(page, offset, total, count, "Search results exhausted");
            break;
        }

        offset += count;
        consumed += 1;
        for record in result.records {
            episodes.push(to_episode(record, &options.detail_base_url)?);
        }

        tokio::time::sleep(options.page_delay).await;
    }

    tracing::info!(
        keyword = %options.keyword,
        episodes = episodes.len(),
        pages = consumed,
        "Guide fetch complete"
    );
    Ok(episodes)
}

fn to_episode(record: RawEpisode, detail_base_url: &str) -> Result<Episode, FetchError> {
    let start_time = parse_broadcast_time(&record.start_date.date).inspect_err(|e| {
        tracing::warn!(
            id = %record.id,
            timezone = record.start_date.timezone.as_deref().unwrap_or("-"),
            error = %e,
            "Unparseable start date"
        );
    })?;
    Ok(Episode {
        title: normalize_title(&record.title),
        start_time,
        recorded: false,
        url: format!("{}{}", detail_base_url, record.id),
    })
}
