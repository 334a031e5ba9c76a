//! API request handlers.
//!
//! All SQLite work runs inside `tokio::task::spawn_blocking()` behind a
//! connection semaphore and a timeout, so rusqlite's synchronous calls
//! never park a Tokio worker thread and a wedged database turns into a 504
//! instead of thread-pool exhaustion.
//!
//! Every mutating handler admits the request through the rate limiter
//! before touching state; a denial returns 429 with no side effect.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::Utc;
use futures::Stream;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

use crate::db::Database;
use crate::db::queries::{self, Job};
use crate::error::RozgarError;
use crate::feed::FeedEvent;
use crate::geo::Point;
use crate::ingest;
use crate::matching::{self, DEFAULT_SEARCH_RADIUS_M, JobSearch, MAX_SEARCH_RESULTS};
use crate::notify;
use crate::version;

use super::AppState;
use super::error::ApiError;
use super::middleware::client_ip;
use super::types::*;

/// Execute a database operation with concurrency limiting and timeout.
///
/// Acquires a semaphore permit (bounded wait), runs the closure on the
/// blocking pool, and converts capacity or timeout conditions into the
/// matching API errors.
async fn run_db_operation<T, F>(state: &AppState, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RozgarError> + Send + 'static,
{
    let permit = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        state.db_semaphore.acquire(),
    )
    .await
    {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return Err(ApiError::internal("Database semaphore closed")),
        Err(_) => {
            warn!("database semaphore acquisition timed out - server at capacity");
            return Err(ApiError::overloaded());
        }
    };

    let timeout = state.db_timeout;
    let result = tokio::time::timeout(timeout, tokio::task::spawn_blocking(operation)).await;
    drop(permit);

    match result {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(e.into()),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "database task panicked");
            Err(ApiError::internal(format!("Task join error: {e}")))
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "database operation timed out");
            Err(ApiError::timeout(format!(
                "Database operation timed out after {} seconds",
                timeout.as_secs()
            )))
        }
    }
}

/// Reject the request when its source exceeded the rate limit.
fn admit(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.limiter.allow(&client_ip(headers)) {
        Ok(())
    } else {
        Err(ApiError::rate_limited())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Resolve the caller's profile from a bearer token, if one was sent.
async fn optional_identity(
    state: &Arc<AppState>,
    headers: &HeaderMap,
) -> Result<Option<queries::WorkerProfile>, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let db_path = state.db_path.clone();
    run_db_operation(state, move || {
        let db = Database::open_readonly(&db_path)?;
        queries::profile_by_token(db.connection(), &token)
    })
    .await
}

/// Like [`optional_identity`], but missing or unknown credentials are 401.
async fn require_identity(
    state: &Arc<AppState>,
    headers: &HeaderMap,
) -> Result<queries::WorkerProfile, ApiError> {
    optional_identity(state, headers)
        .await?
        .ok_or_else(ApiError::unauthorized)
}

/// Report a worker's current position.
#[utoipa::path(
    post,
    path = "/api/v1/worker/track",
    request_body = TrackRequest,
    responses(
        (status = 200, description = "Location updated", body = TrackResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 401, description = "Missing or invalid worker identity"),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer_auth" = [])),
    tag = "workers"
)]
#[instrument(skip(state, headers, body), fields(online = body.is_online))]
pub async fn track_worker(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<TrackRequest>,
) -> Result<Json<TrackResponse>, ApiError> {
    let profile = require_identity(&state, &headers).await?;
    let source_key = client_ip(&headers);

    state
        .ingestor
        .ingest_direct(&profile.id, body.latitude, body.longitude, body.is_online, &source_key)?;

    Ok(Json(TrackResponse {
        status: "success".to_string(),
        location_updated: true,
    }))
}

/// Open jobs within a radius of a point, nearest first.
///
/// The radius is clamped by the caller's subscription tier; anonymous
/// callers get the free-tier cap.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/nearby",
    params(
        ("lat" = f64, Query, description = "Origin latitude"),
        ("lon" = f64, Query, description = "Origin longitude"),
        ("radius" = Option<f64>, Query, description = "Requested radius in meters (default 5000, tier-clamped)"),
        ("category" = Option<String>, Query, description = "Filter by job category"),
    ),
    responses(
        (status = 200, description = "Matching jobs with distance_meters", body = Vec<JobResponse>),
        (status = 400, description = "Missing or invalid coordinates"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "jobs"
)]
#[instrument(skip(state, headers), fields(lat = params.lat, lon = params.lon, radius = ?params.radius))]
pub async fn nearby_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<NearbyJobsParams>,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    admit(&state, &headers)?;
    let origin = Point::new(params.lat, params.lon).map_err(ApiError::from)?;
    let tier = optional_identity(&state, &headers)
        .await?
        .map(|p| p.subscriber_tier);

    let search = JobSearch {
        origin,
        radius_m: params
            .radius
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_SEARCH_RADIUS_M),
        limit: MAX_SEARCH_RESULTS,
        category: params.category,
    };

    let db_path = state.db_path.clone();
    let matches = run_db_operation(&state, move || {
        let db = Database::open_readonly(&db_path)?;
        matching::find_jobs_near(db.connection(), &search, tier)
    })
    .await?;

    debug!(matches = matches.len(), "nearby search completed");
    Ok(Json(
        matches
            .into_iter()
            .map(|m| JobResponse::with_distance(m.job, m.distance_m))
            .collect(),
    ))
}

/// Paginated listing of open jobs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    params(
        ("page" = Option<u32>, Query, description = "1-based page index"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("location" = Option<String>, Query, description = "Filter by place-name substring"),
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("search" = Option<String>, Query, description = "Filter by title substring"),
    ),
    responses(
        (status = 200, description = "One page of jobs", body = JobListResponse),
        (status = 429, description = "Rate limited"),
    ),
    tag = "jobs"
)]
#[instrument(skip(state, headers))]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<JobListResponse>, ApiError> {
    admit(&state, &headers)?;

    let opts = queries::ListJobsOptions {
        page: params.page(),
        limit: params.limit(),
        location: params.location.clone(),
        category: params.category.clone(),
        search: params.search.clone(),
    };

    let db_path = state.db_path.clone();
    let page = run_db_operation(&state, move || {
        let db = Database::open_readonly(&db_path)?;
        queries::list_jobs(db.connection(), &opts)
    })
    .await?;

    Ok(Json(JobListResponse {
        jobs: page.jobs.into_iter().map(JobResponse::from).collect(),
        total: page.total,
        page: page.page,
        pages: page.pages,
    }))
}

/// Create a job posting.
///
/// When the posting carries coordinates, the top nearby online workers are
/// ranked and alerted as a fire-and-forget side effect; a dispatch failure
/// never fails the creation.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = JobResponse),
        (status = 400, description = "Validation failed with field-level errors"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer_auth" = [])),
    tag = "jobs"
)]
#[instrument(skip(state, headers, body))]
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    admit(&state, &headers)?;
    let profile = require_identity(&state, &headers).await?;

    let new_job = body
        .into_new_job(Some(profile.id))
        .map_err(ApiError::validation)?;

    let db_path = state.db_path.clone();
    let job = run_db_operation(&state, move || {
        let db = Database::open(&db_path)?;
        queries::insert_job(db.connection(), &new_job, Utc::now())
    })
    .await?;

    info!(job_id = %job.id, "job created");
    spawn_dispatch(state.clone(), job.clone());

    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

/// Fetch a single job.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "The job", body = JobResponse),
        (status = 404, description = "Unknown job id"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "jobs"
)]
#[instrument(skip(state, headers), fields(job_id = %id))]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    admit(&state, &headers)?;

    let db_path = state.db_path.clone();
    let lookup_id = id.clone();
    let job = run_db_operation(&state, move || {
        let db = Database::open_readonly(&db_path)?;
        queries::get_job(db.connection(), &lookup_id)
    })
    .await?;

    match job {
        Some(job) => Ok(Json(JobResponse::from(job))),
        None => Err(ApiError::not_found(format!("Job '{id}' not found"))),
    }
}

/// Partially update a job.
#[utoipa::path(
    patch,
    path = "/api/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job id")),
    request_body = UpdateJobRequest,
    responses(
        (status = 200, description = "Updated job", body = JobResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 404, description = "Unknown job id"),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer_auth" = [])),
    tag = "jobs"
)]
#[instrument(skip(state, headers, body), fields(job_id = %id))]
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateJobRequest>,
) -> Result<Json<JobResponse>, ApiError> {
    admit(&state, &headers)?;
    require_identity(&state, &headers).await?;

    let patch = body.into_patch().map_err(ApiError::validation)?;

    let db_path = state.db_path.clone();
    let update_id = id.clone();
    let job = run_db_operation(&state, move || {
        let db = Database::open(&db_path)?;
        queries::update_job(db.connection(), &update_id, &patch)
    })
    .await?;

    match job {
        Some(job) => Ok(Json(JobResponse::from(job))),
        None => Err(ApiError::not_found(format!("Job '{id}' not found"))),
    }
}

/// Delete a job posting.
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 404, description = "Unknown job id"),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer_auth" = [])),
    tag = "jobs"
)]
#[instrument(skip(state, headers), fields(job_id = %id))]
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    admit(&state, &headers)?;
    require_identity(&state, &headers).await?;

    let db_path = state.db_path.clone();
    let delete_id = id.clone();
    let deleted = run_db_operation(&state, move || {
        let db = Database::open(&db_path)?;
        queries::delete_job(db.connection(), &delete_id)
    })
    .await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Job '{id}' not found")))
    }
}

/// Density of open jobs on a rounded coordinate grid.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/heatmap",
    responses(
        (status = 200, description = "Job-density buckets", body = Vec<queries::HeatmapBucket>),
        (status = 429, description = "Rate limited"),
    ),
    tag = "jobs"
)]
#[instrument(skip(state, headers))]
pub async fn job_heatmap(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<queries::HeatmapBucket>>, ApiError> {
    admit(&state, &headers)?;

    let db_path = state.db_path.clone();
    let buckets = run_db_operation(&state, move || {
        let db = Database::open_readonly(&db_path)?;
        queries::job_heatmap(db.connection())
    })
    .await?;

    Ok(Json(buckets))
}

/// Live feed of online worker positions over Server-Sent Events.
///
/// Emits a `snapshot` event with all online workers, then `upsert` and
/// `remove` deltas as they happen. A subscriber that falls behind the
/// bounded buffer is resynced with a fresh snapshot rather than blocking
/// ingestion.
#[utoipa::path(
    get,
    path = "/api/v1/workers/live",
    responses(
        (status = 200, description = "SSE stream of snapshot/upsert/remove events"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer_auth" = [])),
    tag = "workers"
)]
#[instrument(skip(state, headers))]
pub async fn workers_live(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    admit(&state, &headers)?;
    require_identity(&state, &headers).await?;

    // Subscribe before snapshotting so no delta can fall in the gap.
    let rx = state.feed.subscribe();
    let geo = state.geo.clone();
    let mut pending = VecDeque::new();
    if let Some(event) = make_event("snapshot", &geo.snapshot()) {
        pending.push_back(event);
    }

    let stream = futures::stream::unfold((rx, pending, geo), |(mut rx, mut pending, geo)| async move {
        loop {
            if let Some(event) = pending.pop_front() {
                return Some((Ok::<_, Infallible>(event), (rx, pending, geo)));
            }
            match rx.recv().await {
                Ok(FeedEvent::Upsert { worker }) => {
                    if let Some(event) = make_event("upsert", &worker) {
                        return Some((Ok(event), (rx, pending, geo)));
                    }
                }
                Ok(FeedEvent::Remove { worker_id }) => {
                    if let Some(event) =
                        make_event("remove", &serde_json::json!({ "worker_id": worker_id }))
                    {
                        return Some((Ok(event), (rx, pending, geo)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "live feed subscriber lagged; resyncing with snapshot");
                    if let Some(event) = make_event("snapshot", &geo.snapshot()) {
                        pending.push_back(event);
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn make_event<T: Serialize>(name: &str, data: &T) -> Option<Event> {
    match serde_json::to_string(data) {
        Ok(json) => Some(Event::default().event(name.to_string()).data(json)),
        Err(e) => {
            warn!(error = %e, event = name, "failed to serialize feed event");
            None
        }
    }
}

/// Messaging-provider verification handshake.
#[utoipa::path(
    get,
    path = "/webhook/messaging",
    params(
        ("hub.mode" = Option<String>, Query, description = "Must be 'subscribe'"),
        ("hub.verify_token" = Option<String>, Query, description = "Shared verify token"),
        ("hub.challenge" = Option<String>, Query, description = "Challenge echoed back on success"),
    ),
    responses(
        (status = 200, description = "Challenge echoed"),
        (status = 403, description = "Verification failed"),
    ),
    tag = "webhook"
)]
pub async fn webhook_verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WebhookVerifyParams>,
) -> Response {
    match (params.mode.as_deref(), params.verify_token.as_deref(), params.challenge) {
        (Some("subscribe"), Some(token), Some(challenge))
            if token == state.webhook_verify_token =>
        {
            challenge.into_response()
        }
        _ => ApiError::forbidden("Verification failed").into_response(),
    }
}

/// Receive a messaging-channel event.
///
/// Only `{from, location: {latitude, longitude}}` pings are acted on; every
/// other shape (including signature mismatches and malformed coordinates)
/// is acked with 200 so the channel does not retry.
#[utoipa::path(
    post,
    path = "/webhook/messaging",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Acknowledged", body = WebhookAck),
        (status = 429, description = "Rate limited"),
        (status = 500, description = "Storage failure; safe for the channel to retry"),
    ),
    tag = "webhook"
)]
#[instrument(skip(state, headers, body))]
pub async fn webhook_receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    if let Some(secret) = &state.webhook_app_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_webhook_signature(secret, &body, signature) {
            warn!("webhook signature mismatch; payload ignored");
            return Ok(Json(WebhookAck::ok()));
        }
    }

    let Ok(payload) = serde_json::from_slice::<WebhookPayload>(&body) else {
        return Ok(Json(WebhookAck::ok()));
    };
    let (Some(from), Some(location)) = (payload.from, payload.location) else {
        return Ok(Json(WebhookAck::ok()));
    };
    if Point::new(location.latitude, location.longitude).is_err() {
        info!("webhook ping with out-of-range coordinates; ignored");
        return Ok(Json(WebhookAck::ok()));
    }

    let db_path = state.db_path.clone();
    let ingest_state = state.clone();
    let sender = from.clone();
    let outcome = run_db_operation(&state, move || {
        let db = Database::open(&db_path)?;
        ingest_state
            .ingestor
            .ingest_webhook(db.connection(), &sender, location.latitude, location.longitude)
    })
    .await?;

    // Reply delivery is best-effort and must not delay or fail the ack.
    let reply = ingest::format_webhook_reply(&outcome);
    let to = ingest::normalize_phone(&from);
    let sink = state.sink.clone();
    tokio::spawn(async move {
        if let Err(e) = sink.send_text(&to, &reply).await {
            warn!(error = %e, "webhook auto-reply failed");
        }
    });

    Ok(Json(WebhookAck::ok()))
}

/// Health check endpoint.
///
/// Deliberately skips the rate limiter and the database semaphore so it
/// can answer even when the server is saturated.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::full_version(),
    })
}

/// Server gauges for monitoring.
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    responses((status = 200, description = "Server metrics", body = MetricsResponse)),
    tag = "monitoring"
)]
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let available_permits = state.db_semaphore.available_permits();
    let limiter_config = state.limiter.config();

    Json(MetricsResponse {
        server: ServerMetrics {
            version: version::full_version(),
            status: "ok".to_string(),
        },
        database: DatabaseMetrics {
            max_connections: state.max_db_connections,
            available_permits,
            in_use: state.max_db_connections.saturating_sub(available_permits),
            timeout_seconds: state.db_timeout.as_secs(),
        },
        rate_limit: RateLimitMetrics {
            window_seconds: limiter_config.window.as_secs(),
            max_requests: limiter_config.max_requests,
            tracked_keys: state.limiter.tracked_keys(),
        },
        feed: FeedMetrics {
            subscribers: state.feed.subscriber_count(),
            online_workers: state.geo.online_count(),
        },
    })
}

/// Rank nearby online workers for a fresh posting and alert them.
///
/// Runs detached from the request: job creation has already committed and
/// must not observe any failure here.
fn spawn_dispatch(state: Arc<AppState>, job: Job) {
    tokio::spawn(async move {
        let Some(matches) = matching::find_workers_for(&state.geo, &job) else {
            debug!(job_id = %job.id, "dispatch skipped: job has no coordinates");
            return;
        };
        if matches.is_empty() {
            debug!(job_id = %job.id, "dispatch found no online workers in range");
            return;
        }
        info!(job_id = %job.id, candidates = matches.len(), "dispatching job alerts");

        let db_path = state.db_path.clone();
        let ids: Vec<String> = matches.iter().map(|m| m.worker_id.clone()).collect();
        let phones = tokio::task::spawn_blocking(move || -> Result<Vec<Option<String>>, RozgarError> {
            let db = Database::open_readonly(&db_path)?;
            ids.iter()
                .map(|id| Ok(queries::profile_by_id(db.connection(), id)?.and_then(|p| p.phone)))
                .collect()
        })
        .await;

        let phones = match phones {
            Ok(Ok(phones)) => phones,
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "dispatch phone lookup failed");
                return;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "dispatch task panicked");
                return;
            }
        };

        for (candidate, phone) in matches.iter().zip(phones) {
            let Some(phone) = phone else { continue };
            let alert = notify::format_dispatch_alert(&job, candidate.distance_m);
            if let Err(e) = state.sink.send_text(&phone, &alert).await {
                warn!(worker_id = %candidate.worker_id, error = %e, "dispatch alert failed");
            }
        }
    });
}

/// Check a hex `sha256=` HMAC signature over the raw request body.
fn verify_webhook_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else { return false };
    let Some(hex_signature) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Some(expected) = decode_hex(hex_signature) else {
        return false;
    };

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("sha256={hex}")
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"from":"919900112233"}"#;
        let header = sign("topsecret", body);
        assert!(verify_webhook_signature("topsecret", body, Some(&header)));
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let body = b"payload";
        let header = sign("topsecret", body);
        assert!(!verify_webhook_signature("othersecret", body, Some(&header)));
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let header = sign("topsecret", b"payload");
        assert!(!verify_webhook_signature("topsecret", b"payload2", Some(&header)));
    }

    #[test]
    fn test_signature_rejects_missing_or_malformed_header() {
        assert!(!verify_webhook_signature("s", b"x", None));
        assert!(!verify_webhook_signature("s", b"x", Some("md5=abcd")));
        assert!(!verify_webhook_signature("s", b"x", Some("sha256=zz")));
        assert!(!verify_webhook_signature("s", b"x", Some("sha256=abc")));
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("00ff"), Some(vec![0x00, 0xff]));
        assert_eq!(decode_hex("0f1e2d"), Some(vec![0x0f, 0x1e, 0x2d]));
        assert!(decode_hex("0").is_none());
        assert!(decode_hex("zz").is_none());
    }
}
