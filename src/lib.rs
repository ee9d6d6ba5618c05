//! showwatch: keeps a list of upcoming broadcasts of one show in sync with a
//! TV guide search API and reminds you about the ones you have not recorded.
//!
//! One run of [`pipeline::run_once`] acquires the run lock, loads the stored
//! episodes, fetches fresh guide results, reconciles both lists, writes the
//! result back and notifies about unrecorded episodes airing soon.

pub mod config;
pub mod filter;
pub mod guide;
pub mod lock;
pub mod notify;
pub mod pipeline;
pub mod reconcile;
pub mod storage;
pub mod util;
