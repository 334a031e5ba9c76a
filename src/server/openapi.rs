//! OpenAPI specification for the rozgar API.

use utoipa::{Modify, OpenApi};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use super::handlers;
use super::types::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "rozgar API",
        description = "Geospatial job matching and live worker radar. Track worker positions, search open jobs by radius, and stream live online-worker updates.",
        version = "1.0.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "rozgar", url = "https://github.com/rozgar-labs/rozgar")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        handlers::track_worker,
        handlers::nearby_jobs,
        handlers::list_jobs,
        handlers::create_job,
        handlers::get_job,
        handlers::update_job,
        handlers::delete_job,
        handlers::job_heatmap,
        handlers::workers_live,
        handlers::webhook_verify,
        handlers::webhook_receive,
        handlers::health_check,
        handlers::get_metrics,
    ),
    components(schemas(
        TrackRequest,
        TrackResponse,
        JobResponse,
        JobListResponse,
        CreateJobRequest,
        UpdateJobRequest,
        WebhookPayload,
        WebhookLocation,
        WebhookAck,
        HealthResponse,
        MetricsResponse,
        ServerMetrics,
        DatabaseMetrics,
        RateLimitMetrics,
        FeedMetrics,
        crate::db::queries::HeatmapBucket,
        crate::db::queries::JobStatus,
        crate::db::queries::JobType,
        crate::error::FieldError,
        crate::feed::FeedEvent,
        crate::geoindex::WorkerLocation,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "workers", description = "Worker tracking and the live radar feed"),
        (name = "jobs", description = "Job postings and radius search"),
        (name = "webhook", description = "Messaging-channel adapter"),
        (name = "health", description = "Health checks"),
        (name = "monitoring", description = "Server metrics and monitoring")
    )
)]
pub struct ApiDoc;
