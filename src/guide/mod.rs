//! TV guide access: searching for a show and turning raw guide records
//! into [`Episode`](crate::storage::Episode)s.
//!
//! - [`title`] - title normalization (dedup key)
//! - [`date`] - loose timestamp parsing
//! - [`client`] - the search endpoint (`SearchApi` + reqwest client)
//! - [`fetcher`] - the pagination loop
//!
//! # Example
//!
//! ```ignore
//! use showwatch::guide::{fetch_episodes, FetchOptions, HttpSearchClient};
//!
//! let api = HttpSearchClient::new(reqwest::Client::new(), "https://tv.example.com/api/search")?;
//! let episodes = fetch_episodes(&api, &options).await?;
//! ```

pub mod client;
pub mod date;
pub mod fetcher;
pub mod title;

pub use client::{FetchError, HttpSearchClient, RawEpisode, SearchApi, SearchPage};
pub use date::{parse_broadcast_time, DateParseError};
pub use fetcher::{fetch_episodes, FetchOptions};
pub use title::normalize_title;
