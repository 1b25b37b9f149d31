use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dates::normalize_pub_date;
use crate::db::{Database, DbError, Feed, NewPost};
use crate::fetcher::FeedDocument;
use crate::sanitize::{sanitize_item, CleanItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// A post with the same URL is already stored
    AlreadyKnown,
}

/// Per-feed tally of what happened to each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Store one sanitized item as a post. The post URL is the dedup key, so a
/// uniqueness conflict means the item was ingested before.
pub async fn ingest_item(
    db: &Database,
    feed_id: Uuid,
    item: &CleanItem,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, DbError> {
    let post = NewPost {
        feed_id,
        title: &item.title,
        url: &item.link,
        description: &item.description,
        published_at: normalize_pub_date(&item.pub_date, now),
    };

    match db.create_post(&post, now).await {
        Ok(_) => Ok(IngestOutcome::Inserted),
        Err(e) if e.is_conflict() => Ok(IngestOutcome::AlreadyKnown),
        Err(e) => Err(e),
    }
}

/// Sanitize and store every item of `doc`. A failing item never stops the rest.
pub async fn ingest_document(
    db: &Database,
    feed: &Feed,
    doc: &FeedDocument,
    now: DateTime<Utc>,
) -> IngestReport {
    let mut report = IngestReport::default();

    for raw in &doc.items {
        let item = match sanitize_item(raw) {
            Ok(item) => item,
            Err(reason) => {
                info!("Skipping item {:?} from '{}': {}", raw.link, feed.name, reason);
                report.skipped += 1;
                continue;
            }
        };

        match ingest_item(db, feed.id, &item, now).await {
            Ok(IngestOutcome::Inserted) => {
                debug!("Stored post {}", item.link);
                report.inserted += 1;
            }
            Ok(IngestOutcome::AlreadyKnown) => {
                debug!("Post {} already known", item.link);
                report.duplicates += 1;
            }
            Err(e) => {
                warn!("Failed to store post {}: {}", item.link, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Feed '{}': {} new, {} known, {} skipped, {} failed",
        feed.name, report.inserted, report.duplicates, report.skipped, report.failed
    );
    report
}
