//! Location ingestion: validates and applies inbound worker pings.
//!
//! Two entry paths share the same pipeline — validate coordinates, admit
//! through the rate limiter, upsert the GeoIndex:
//!
//! - the direct API (`POST /worker/track`), which returns a plain success
//!   and leaves job searching to an explicit call;
//! - the messaging webhook, which additionally runs the fixed-radius job
//!   search and produces the text reply handed to the messaging sink.
//!
//! A worker is `unknown -> online` on the first valid ping and stays online
//! on later pings; only an explicit `is_online = false` forces it offline.
//! Going stale is a read-time concern handled by the GeoIndex.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use crate::db::queries;
use crate::error::{Result, RozgarError};
use crate::geo::Point;
use crate::geoindex::GeoIndex;
use crate::matching::{self, JobMatch, JobSearch, WEBHOOK_SEARCH_LIMIT, WEBHOOK_SEARCH_RADIUS_M};
use crate::ratelimit::RateLimiter;

/// Result of a webhook-sourced ingest, which decides the auto-reply.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Sender's phone is not a registered worker; no location row was
    /// created. The reply is a registration prompt.
    Unregistered,
    /// Location applied; nothing open within the search radius.
    NoJobs,
    /// Location applied; nearby open jobs, nearest first.
    Jobs(Vec<JobMatch>),
}

/// Applies inbound location updates to the GeoIndex.
pub struct LocationIngestor {
    geo: Arc<GeoIndex>,
    limiter: Arc<RateLimiter>,
}

impl LocationIngestor {
    pub fn new(geo: Arc<GeoIndex>, limiter: Arc<RateLimiter>) -> Self {
        Self { geo, limiter }
    }

    /// Apply a ping from the direct tracking API.
    ///
    /// `source_key` is the caller's network address for rate limiting. The
    /// direct path deliberately runs no job search.
    pub fn ingest_direct(
        &self,
        worker_id: &str,
        latitude: f64,
        longitude: f64,
        online: bool,
        source_key: &str,
    ) -> Result<()> {
        let point = Point::new(latitude, longitude)?;
        if !self.limiter.allow(source_key) {
            return Err(RozgarError::RateLimited);
        }
        self.geo.upsert(worker_id, point, online, Utc::now());
        debug!(worker_id, online, "location updated (direct)");
        Ok(())
    }

    /// Apply a location ping that arrived over the messaging channel.
    ///
    /// The sender phone doubles as the rate-limit key. An unrecognized
    /// phone never creates a location row.
    pub fn ingest_webhook(
        &self,
        conn: &Connection,
        from_phone: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<WebhookOutcome> {
        let point = Point::new(latitude, longitude)?;
        let phone = normalize_phone(from_phone);
        if !self.limiter.allow(&phone) {
            return Err(RozgarError::RateLimited);
        }

        let Some(profile) = queries::profile_by_phone(conn, &phone)? else {
            debug!(phone = %phone, "webhook ping from unregistered sender");
            return Ok(WebhookOutcome::Unregistered);
        };

        self.geo.upsert(&profile.id, point, true, Utc::now());

        let search = JobSearch {
            origin: point,
            radius_m: WEBHOOK_SEARCH_RADIUS_M,
            limit: WEBHOOK_SEARCH_LIMIT,
            category: None,
        };
        let matches = matching::find_jobs_near(conn, &search, Some(profile.subscriber_tier))?;
        debug!(worker_id = %profile.id, matches = matches.len(), "location updated (webhook)");

        if matches.is_empty() {
            Ok(WebhookOutcome::NoJobs)
        } else {
            Ok(WebhookOutcome::Jobs(matches))
        }
    }
}

/// Normalize a messaging-channel sender id to `+<digits>`.
///
/// Providers send bare numbers (`919900112233`); profiles store them with a
/// leading plus.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("+{digits}")
}

/// Render the webhook auto-reply handed to the messaging sink.
pub fn format_webhook_reply(outcome: &WebhookOutcome) -> String {
    match outcome {
        WebhookOutcome::Unregistered => {
            "Welcome to Rozgar! Please register on the app to start finding jobs near you."
                .to_string()
        }
        WebhookOutcome::NoJobs => {
            "Location tracking active. No open jobs within 5 km right now; we will alert you when one appears."
                .to_string()
        }
        WebhookOutcome::Jobs(matches) => {
            let mut reply = format!(
                "Found {} open job{} within 5 km of your location:\n\n",
                matches.len(),
                if matches.len() == 1 { "" } else { "s" },
            );
            for m in matches {
                reply.push_str(&format!(
                    "{} ({}m away)\nRs {}/day | {}\nCall {}\n\n",
                    m.job.title,
                    m.distance_m.round() as i64,
                    m.job.salary_per_day,
                    m.job.employer_name,
                    m.job.phone,
                ));
            }
            reply.trim_end().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::db::queries::{JobType, NewJob, WorkerProfile, insert_job, insert_profile};
    use crate::feed::LiveFeed;
    use crate::geoindex::DEFAULT_FRESHNESS;
    use crate::ratelimit::{RateLimitConfig, RateLimiter};
    use crate::tier::Tier;
    use std::time::Duration;
    use tempfile::tempdir;

    fn ingestor() -> LocationIngestor {
        let feed = LiveFeed::new(64);
        let geo = Arc::new(GeoIndex::new(DEFAULT_FRESHNESS, feed.sender()));
        let limiter = Arc::new(RateLimiter::default());
        LocationIngestor::new(geo, limiter)
    }

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn seed_worker(db: &Database, phone: &str) {
        insert_profile(
            db.connection(),
            &WorkerProfile {
                id: "w-1".to_string(),
                phone: Some(phone.to_string()),
                display_name: Some("Ramu".to_string()),
                subscriber_tier: Tier::Free,
                rating: None,
            },
            Some("tok-w1"),
        )
        .unwrap();
    }

    fn seed_job(db: &Database) {
        insert_job(
            db.connection(),
            &NewJob {
                title: "Sugarcane cutting".to_string(),
                employer_id: None,
                employer_name: "Patil Farms".to_string(),
                phone: "+919812345678".to_string(),
                location: "Pune".to_string(),
                latitude: Some(18.521),
                longitude: Some(73.851),
                salary_per_day: 650.0,
                job_type: JobType::Daily,
                category: "harvest".to_string(),
                description: None,
            },
            Utc::now(),
        )
        .unwrap();
    }

    #[test]
    fn test_direct_first_ping_brings_worker_online() {
        let ing = ingestor();
        ing.ingest_direct("w-1", 18.52, 73.85, true, "10.0.0.1").unwrap();

        let loc = ing.geo.get("w-1").unwrap();
        assert!(loc.is_online);
        assert!((loc.latitude - 18.52).abs() < 1e-9);
    }

    #[test]
    fn test_direct_rejects_invalid_coordinates() {
        let ing = ingestor();
        let err = ing.ingest_direct("w-1", 123.0, 73.85, true, "10.0.0.1").unwrap_err();
        assert!(matches!(err, RozgarError::InvalidCoordinate(_)));
        assert!(ing.geo.get("w-1").is_none());
    }

    #[test]
    fn test_direct_explicit_offline() {
        let ing = ingestor();
        ing.ingest_direct("w-1", 18.52, 73.85, true, "10.0.0.1").unwrap();
        ing.ingest_direct("w-1", 18.52, 73.85, false, "10.0.0.1").unwrap();
        assert!(!ing.geo.get("w-1").unwrap().is_online);
    }

    #[test]
    fn test_direct_rate_limited() {
        let feed = LiveFeed::new(64);
        let geo = Arc::new(GeoIndex::new(DEFAULT_FRESHNESS, feed.sender()));
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: 2,
            max_keys: 10,
        }));
        let ing = LocationIngestor::new(geo, limiter);

        ing.ingest_direct("w-1", 18.52, 73.85, true, "10.0.0.1").unwrap();
        ing.ingest_direct("w-1", 18.52, 73.85, true, "10.0.0.1").unwrap();
        let err = ing.ingest_direct("w-1", 18.52, 73.85, true, "10.0.0.1").unwrap_err();
        assert!(matches!(err, RozgarError::RateLimited));
    }

    #[test]
    fn test_webhook_unregistered_creates_no_row() {
        let ing = ingestor();
        let (_dir, db) = test_db();

        let outcome = ing
            .ingest_webhook(db.connection(), "919900112233", 18.52, 73.85)
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Unregistered));
        assert!(ing.geo.get("w-1").is_none());
        assert_eq!(ing.geo.online_count(), 0);
    }

    #[test]
    fn test_webhook_registered_updates_and_finds_jobs() {
        let ing = ingestor();
        let (_dir, db) = test_db();
        seed_worker(&db, "+919900112233");
        seed_job(&db);

        let outcome = ing
            .ingest_webhook(db.connection(), "919900112233", 18.52, 73.85)
            .unwrap();
        match outcome {
            WebhookOutcome::Jobs(matches) => {
                assert_eq!(matches.len(), 1);
                assert!((100.0..300.0).contains(&matches[0].distance_m));
            }
            other => panic!("expected jobs, got {other:?}"),
        }
        assert!(ing.geo.get("w-1").unwrap().is_online);
    }

    #[test]
    fn test_webhook_registered_no_jobs_nearby() {
        let ing = ingestor();
        let (_dir, db) = test_db();
        seed_worker(&db, "+919900112233");

        let outcome = ing
            .ingest_webhook(db.connection(), "919900112233", 18.52, 73.85)
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::NoJobs));
        assert!(ing.geo.get("w-1").is_some());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("919900112233"), "+919900112233");
        assert_eq!(normalize_phone("+91 99001 12233"), "+919900112233");
        assert_eq!(normalize_phone("+919900112233"), "+919900112233");
    }

    #[test]
    fn test_format_reply_lists_jobs() {
        let (_dir, db) = test_db();
        seed_job(&db);
        let search = JobSearch {
            origin: Point::new(18.52, 73.85).unwrap(),
            radius_m: 5_000.0,
            limit: 3,
            category: None,
        };
        let matches = matching::find_jobs_near(db.connection(), &search, None).unwrap();
        let reply = format_webhook_reply(&WebhookOutcome::Jobs(matches));
        assert!(reply.contains("Sugarcane cutting"));
        assert!(reply.contains("Patil Farms"));
        assert!(reply.contains("m away"));
    }

    #[test]
    fn test_format_reply_registration_prompt() {
        let reply = format_webhook_reply(&WebhookOutcome::Unregistered);
        assert!(reply.to_lowercase().contains("register"));
    }
}
