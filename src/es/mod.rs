//! Elasticsearch index client.
//!
//! [`EsClient`] binds one cluster base URL and one index name. The mapping
//! is introspected once at connect time and cached as the field list; bulk
//! insertion validates documents against that list, chunks at
//! [`MAX_BATCH_LEN`], and retries each chunk per the injected
//! [`RetryPolicy`]. Scroll pagination hands the caller an explicit
//! [`ScrollCursor`] instead of holding hidden request state.
//!
//! Queries, deletes and scroll requests are never retried; only bulk
//! submission is.

pub mod bulk;
pub mod client;
pub mod retry;
pub mod scroll;

pub use bulk::{BatchOutcome, BulkReport, DroppedDoc, MAX_BATCH_LEN};
pub use client::{EsClient, EsClientOptions};
pub use retry::RetryPolicy;
pub use scroll::{ScrollCursor, ScrollPage};
