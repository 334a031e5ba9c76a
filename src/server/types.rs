//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::queries::{Job, JobPatch, JobStatus, JobType, NewJob};
use crate::error::FieldError;

/// Hard cap on page size to bound response memory.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Default page size for job listings.
const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Body of `POST /api/v1/worker/track`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Defaults to true; false is an explicit sign-off.
    #[serde(default = "default_true")]
    pub is_online: bool,
}

fn default_true() -> bool {
    true
}

/// Response of `POST /api/v1/worker/track`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackResponse {
    pub status: String,
    pub location_updated: bool,
}

/// Query parameters for `GET /api/v1/jobs/nearby`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NearbyJobsParams {
    pub lat: f64,
    pub lon: f64,
    /// Requested radius in meters; clamped by subscription tier.
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Query parameters for the paginated job listing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListJobsParams {
    /// 1-based page index (default: 1).
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size (default: 10, max: 100).
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Case-insensitive title substring.
    #[serde(default)]
    pub search: Option<String>,
}

impl ListJobsParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
    }
}

/// A job as returned by the API, optionally carrying the distance that
/// ranked it in a radius search.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_id: Option<String>,
    pub employer_name: String,
    pub phone: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub salary_per_day: f64,
    pub job_type: JobType,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Haversine distance from the query origin, meters. Present only on
    /// radius search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

impl JobResponse {
    pub fn with_distance(job: Job, distance_meters: f64) -> Self {
        let mut response = Self::from(job);
        response.distance_meters = Some(distance_meters);
        response
    }
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            title: job.title,
            employer_id: job.employer_id,
            employer_name: job.employer_name,
            phone: job.phone,
            location: job.location,
            latitude: job.latitude,
            longitude: job.longitude,
            salary_per_day: job.salary_per_day,
            job_type: job.job_type,
            category: job.category,
            description: job.description,
            status: job.status,
            created_at: job.created_at,
            distance_meters: None,
        }
    }
}

/// One page of jobs plus pagination totals.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    pub title: String,
    pub employer_name: String,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub salary_per_day: f64,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default = "default_category")]
    pub category: String,
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_category() -> String {
    "labor".to_string()
}

impl CreateJobRequest {
    /// Validate and convert into an insertable posting.
    ///
    /// `employer_id` comes from the authenticated caller, not the body.
    pub fn into_new_job(self, employer_id: Option<String>) -> Result<NewJob, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = self.title.trim().to_string();
        if title.len() < 3 || title.len() > 100 {
            errors.push(FieldError::new("title", "Job title must be 3-100 characters"));
        }
        if self.employer_name.trim().len() < 2 {
            errors.push(FieldError::new("employer_name", "Employer name is required"));
        }
        if self.location.trim().len() < 2 {
            errors.push(FieldError::new("location", "Location is required"));
        }
        if !(self.salary_per_day.is_finite() && self.salary_per_day > 0.0) {
            errors.push(FieldError::new("salary_per_day", "Salary must be positive"));
        }
        if self.category.trim().len() < 2 {
            errors.push(FieldError::new("category", "Category must be at least 2 characters"));
        }
        if !is_valid_phone(&self.phone) {
            errors.push(FieldError::new("phone", "Valid phone number is required"));
        }

        match (self.latitude, self.longitude) {
            (None, None) => {}
            (Some(lat), Some(lon)) => {
                if crate::geo::Point::new(lat, lon).is_err() {
                    errors.push(FieldError::new("latitude", "Coordinates out of range"));
                }
            }
            _ => {
                errors.push(FieldError::new(
                    "latitude",
                    "Latitude and longitude must be provided together",
                ));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewJob {
            title,
            employer_id,
            employer_name: self.employer_name.trim().to_string(),
            phone: self.phone,
            location: self.location.trim().to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            salary_per_day: self.salary_per_day,
            job_type: self.job_type,
            category: self.category.trim().to_string(),
            description: self.description,
        })
    }
}

/// Body of `PATCH /api/v1/jobs/{id}`. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub employer_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub salary_per_day: Option<f64>,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

impl UpdateJobRequest {
    pub fn into_patch(self) -> Result<JobPatch, Vec<FieldError>> {
        let mut errors = Vec::new();

        if let Some(ref title) = self.title {
            if title.trim().len() < 3 || title.trim().len() > 100 {
                errors.push(FieldError::new("title", "Job title must be 3-100 characters"));
            }
        }
        if let Some(ref name) = self.employer_name {
            if name.trim().len() < 2 {
                errors.push(FieldError::new("employer_name", "Employer name is required"));
            }
        }
        if let Some(ref location) = self.location {
            if location.trim().len() < 2 {
                errors.push(FieldError::new("location", "Location is required"));
            }
        }
        if let Some(salary) = self.salary_per_day {
            if !(salary.is_finite() && salary > 0.0) {
                errors.push(FieldError::new("salary_per_day", "Salary must be positive"));
            }
        }
        if let Some(ref category) = self.category {
            if category.trim().len() < 2 {
                errors.push(FieldError::new("category", "Category must be at least 2 characters"));
            }
        }
        if let Some(ref phone) = self.phone {
            if !is_valid_phone(phone) {
                errors.push(FieldError::new("phone", "Valid phone number is required"));
            }
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            if crate::geo::Point::new(lat, lon).is_err() {
                errors.push(FieldError::new("latitude", "Coordinates out of range"));
            }
        } else if self.latitude.is_some() != self.longitude.is_some() {
            errors.push(FieldError::new(
                "latitude",
                "Latitude and longitude must be provided together",
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(JobPatch {
            title: self.title.map(|s| s.trim().to_string()),
            employer_name: self.employer_name.map(|s| s.trim().to_string()),
            phone: self.phone,
            location: self.location.map(|s| s.trim().to_string()),
            latitude: self.latitude,
            longitude: self.longitude,
            salary_per_day: self.salary_per_day,
            job_type: self.job_type,
            category: self.category.map(|s| s.trim().to_string()),
            description: self.description,
            status: self.status,
        })
    }
}

/// `^\+?[0-9]{10,14}$` without pulling in a regex engine.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (10..=14).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Messaging-channel verification handshake parameters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookVerifyParams {
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
}

/// Location ping delivered by the webhook adapter. Anything that does not
/// match this shape is acked and ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookPayload {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub location: Option<WebhookLocation>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Webhook acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: String,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server metrics response for monitoring.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub server: ServerMetrics,
    pub database: DatabaseMetrics,
    pub rate_limit: RateLimitMetrics,
    pub feed: FeedMetrics,
}

/// Server-level metrics.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServerMetrics {
    pub version: String,
    pub status: String,
}

/// Database connection pool metrics.
#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseMetrics {
    pub max_connections: usize,
    pub available_permits: usize,
    pub in_use: usize,
    pub timeout_seconds: u64,
}

/// Rate limiter gauges.
#[derive(Debug, Serialize, ToSchema)]
pub struct RateLimitMetrics {
    pub window_seconds: u64,
    pub max_requests: u32,
    pub tracked_keys: usize,
}

/// Live feed gauges.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedMetrics {
    pub subscribers: usize,
    pub online_workers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CreateJobRequest {
        CreateJobRequest {
            title: "Sugarcane cutting".to_string(),
            employer_name: "Patil Farms".to_string(),
            location: "Shivajinagar, Pune".to_string(),
            latitude: Some(18.52),
            longitude: Some(73.85),
            salary_per_day: 650.0,
            job_type: JobType::Daily,
            category: "harvest".to_string(),
            phone: "+919812345678".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_valid_request_converts() {
        let new_job = base_request().into_new_job(Some("emp-1".to_string())).unwrap();
        assert_eq!(new_job.title, "Sugarcane cutting");
        assert_eq!(new_job.employer_id.as_deref(), Some("emp-1"));
    }

    #[test]
    fn test_short_title_rejected() {
        let mut req = base_request();
        req.title = "ab".to_string();
        let errors = req.into_new_job(None).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "title"));
    }

    #[test]
    fn test_negative_salary_rejected() {
        let mut req = base_request();
        req.salary_per_day = -10.0;
        let errors = req.into_new_job(None).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "salary_per_day"));
    }

    #[test]
    fn test_bad_phone_rejected() {
        for phone in ["12345", "abcdefghij", "+12345678901234567"] {
            let mut req = base_request();
            req.phone = phone.to_string();
            let errors = req.into_new_job(None).unwrap_err();
            assert!(errors.iter().any(|e| e.field == "phone"), "{phone} passed");
        }
    }

    #[test]
    fn test_multiple_errors_reported_together() {
        let mut req = base_request();
        req.title = "x".to_string();
        req.phone = "nope".to_string();
        let errors = req.into_new_job(None).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_lone_latitude_rejected() {
        let mut req = base_request();
        req.longitude = None;
        let errors = req.into_new_job(None).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "latitude"));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let mut req = base_request();
        req.latitude = Some(123.0);
        let errors = req.into_new_job(None).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "latitude"));
    }

    #[test]
    fn test_missing_coordinates_allowed() {
        let mut req = base_request();
        req.latitude = None;
        req.longitude = None;
        let new_job = req.into_new_job(None).unwrap();
        assert!(new_job.latitude.is_none());
    }

    #[test]
    fn test_is_valid_phone() {
        assert!(is_valid_phone("+919812345678"));
        assert!(is_valid_phone("9812345678"));
        assert!(is_valid_phone("+12025550117"));
        assert!(!is_valid_phone("98123"));
        assert!(!is_valid_phone("+98-123-45678"));
        assert!(!is_valid_phone("123456789012345"));
    }

    #[test]
    fn test_patch_partial_validation() {
        let req = UpdateJobRequest {
            salary_per_day: Some(0.0),
            ..Default::default()
        };
        let errors = req.into_patch().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "salary_per_day"));

        let req = UpdateJobRequest {
            status: Some(JobStatus::Filled),
            ..Default::default()
        };
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.status, Some(JobStatus::Filled));
        assert!(patch.title.is_none());
    }

    #[test]
    fn test_list_params_clamping() {
        let params = ListJobsParams {
            page: Some(0),
            limit: Some(1_000),
            location: None,
            category: None,
            search: None,
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_PAGE_LIMIT);
    }
}
