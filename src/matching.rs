//! Shared matching logic for the API, the webhook and job dispatch.
//!
//! Two directions: workers searching for jobs near them (tier-clamped
//! radius against the job catalog), and freshly created jobs searching for
//! workers near them (fixed dispatch radius against the live GeoIndex).

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries::{self, Job};
use crate::error::Result;
use crate::geo::Point;
use crate::geoindex::GeoIndex;
use crate::tier::{self, Tier};

/// Radius searched around a new job when ranking workers for dispatch.
pub const DISPATCH_RADIUS_M: f64 = 5_000.0;

/// Number of workers notified per dispatch.
pub const DISPATCH_TOP_K: usize = 5;

/// Radius used for the automatic job search on a webhook location ping.
pub const WEBHOOK_SEARCH_RADIUS_M: f64 = 5_000.0;

/// Jobs included in a webhook auto-reply.
pub const WEBHOOK_SEARCH_LIMIT: usize = 3;

/// Default radius when a search does not specify one.
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 5_000.0;

/// Hard cap on results returned by a nearby-jobs search.
pub const MAX_SEARCH_RESULTS: usize = 100;

/// A job matched for a worker, with the distance that ranked it.
#[derive(Debug, Clone, Serialize)]
pub struct JobMatch {
    pub job: Job,
    pub distance_m: f64,
}

/// A worker ranked for dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerMatch {
    pub worker_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_m: f64,
}

/// Options for a worker-initiated job search.
#[derive(Debug, Clone)]
pub struct JobSearch {
    pub origin: Point,
    /// Requested radius; clamped by the caller's tier before querying.
    pub radius_m: f64,
    pub limit: usize,
    pub category: Option<String>,
}

impl JobSearch {
    pub fn new(origin: Point) -> Self {
        Self {
            origin,
            radius_m: DEFAULT_SEARCH_RADIUS_M,
            limit: MAX_SEARCH_RESULTS,
            category: None,
        }
    }
}

/// Find open jobs near a point, with the radius clamped to the caller's
/// tier. An empty result is a normal outcome, never an error.
pub fn find_jobs_near(
    conn: &Connection,
    search: &JobSearch,
    tier: Option<Tier>,
) -> Result<Vec<JobMatch>> {
    let effective_radius = tier::resolve_radius(search.radius_m, tier);
    let limit = search.limit.min(MAX_SEARCH_RESULTS);

    let matched = queries::jobs_within(
        conn,
        search.origin,
        effective_radius,
        limit,
        search.category.as_deref(),
    )?;

    Ok(matched
        .into_iter()
        .map(|(job, distance_m)| JobMatch { job, distance_m })
        .collect())
}

/// Rank the nearest online workers for a newly created job.
///
/// Returns `None` when the job has no usable coordinates, in which case
/// dispatch is skipped entirely; job creation has already succeeded by the
/// time this runs.
pub fn find_workers_for(geo: &GeoIndex, job: &Job) -> Option<Vec<WorkerMatch>> {
    let origin = job.point()?;
    let hits = geo.query_radius(origin, DISPATCH_RADIUS_M, DISPATCH_TOP_K);
    Some(
        hits.into_iter()
            .map(|hit| WorkerMatch {
                worker_id: hit.worker_id,
                latitude: hit.latitude,
                longitude: hit.longitude,
                distance_m: hit.distance_m,
            })
            .collect(),
    )
}
