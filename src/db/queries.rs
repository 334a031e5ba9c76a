//! Database query operations for job postings and worker profiles.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::geo::Point;
use crate::tier::Tier;

/// Lifecycle state of a job posting. Only open jobs are matchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Open,
    Filled,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Filled => "filled",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "filled" => Some(Self::Filled),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Pay cadence of a posting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Daily,
    Monthly,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// A job posting row.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub employer_id: Option<String>,
    pub employer_name: String,
    pub phone: String,
    /// Free-text place name as entered by the employer.
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub salary_per_day: f64,
    pub job_type: JobType,
    pub category: String,
    pub description: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Parse a row from the database.
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let created_ts: i64 = row.get("created_at")?;
        let status: String = row.get("status")?;
        let job_type: String = row.get("job_type")?;

        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            employer_id: row.get("employer_id")?,
            employer_name: row.get("employer_name")?,
            phone: row.get("phone")?,
            location: row.get("location")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            salary_per_day: row.get("salary_per_day")?,
            // Unknown values mean a newer writer; treat as unmatchable.
            job_type: JobType::parse(&job_type).unwrap_or_default(),
            category: row.get("category")?,
            description: row.get("description")?,
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Closed),
            created_at: Utc.timestamp_opt(created_ts, 0).unwrap(),
        })
    }

    /// Posting coordinates, if both are present and valid.
    pub fn point(&self) -> Option<Point> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Point::new(lat, lon).ok(),
            _ => None,
        }
    }
}

/// Fields for a new posting. Id, status and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub employer_id: Option<String>,
    pub employer_name: String,
    pub phone: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub salary_per_day: f64,
    pub job_type: JobType,
    pub category: String,
    pub description: Option<String>,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub title: Option<String>,
    pub employer_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub salary_per_day: Option<f64>,
    pub job_type: Option<JobType>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
}

/// Insert a job and return the stored row.
pub fn insert_job(conn: &Connection, new: &NewJob, created_at: DateTime<Utc>) -> Result<Job> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        r#"
        INSERT INTO jobs
            (id, title, employer_id, employer_name, phone, location,
             latitude, longitude, salary_per_day, job_type, category,
             description, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?)
        "#,
        rusqlite::params![
            id,
            new.title,
            new.employer_id,
            new.employer_name,
            new.phone,
            new.location,
            new.latitude,
            new.longitude,
            new.salary_per_day,
            new.job_type.as_str(),
            new.category,
            new.description,
            created_at.timestamp(),
        ],
    )?;

    Ok(Job {
        id,
        title: new.title.clone(),
        employer_id: new.employer_id.clone(),
        employer_name: new.employer_name.clone(),
        phone: new.phone.clone(),
        location: new.location.clone(),
        latitude: new.latitude,
        longitude: new.longitude,
        salary_per_day: new.salary_per_day,
        job_type: new.job_type,
        category: new.category.clone(),
        description: new.description.clone(),
        status: JobStatus::Open,
        created_at: Utc.timestamp_opt(created_at.timestamp(), 0).unwrap(),
    })
}

/// Fetch a job by id.
pub fn get_job(conn: &Connection, id: &str) -> Result<Option<Job>> {
    let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?")?;
    let mut rows = stmt.query_map([id], Job::from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Apply a partial update; returns the updated row, or `None` when the id
/// is unknown.
pub fn update_job(conn: &Connection, id: &str, patch: &JobPatch) -> Result<Option<Job>> {
    let changes = conn.execute(
        r#"
        UPDATE jobs SET
            title = COALESCE(?1, title),
            employer_name = COALESCE(?2, employer_name),
            phone = COALESCE(?3, phone),
            location = COALESCE(?4, location),
            latitude = COALESCE(?5, latitude),
            longitude = COALESCE(?6, longitude),
            salary_per_day = COALESCE(?7, salary_per_day),
            job_type = COALESCE(?8, job_type),
            category = COALESCE(?9, category),
            description = COALESCE(?10, description),
            status = COALESCE(?11, status)
        WHERE id = ?12
        "#,
        rusqlite::params![
            patch.title,
            patch.employer_name,
            patch.phone,
            patch.location,
            patch.latitude,
            patch.longitude,
            patch.salary_per_day,
            patch.job_type.map(|t| t.as_str()),
            patch.category,
            patch.description,
            patch.status.map(|s| s.as_str()),
            id,
        ],
    )?;

    if changes == 0 {
        return Ok(None);
    }
    get_job(conn, id)
}

/// Delete a job. Returns whether a row was removed.
pub fn delete_job(conn: &Connection, id: &str) -> Result<bool> {
    let changes = conn.execute("DELETE FROM jobs WHERE id = ?", [id])?;
    Ok(changes > 0)
}

/// Options for the paginated job listing.
#[derive(Debug, Clone)]
pub struct ListJobsOptions {
    /// 1-based page index.
    pub page: u32,
    pub limit: u32,
    pub location: Option<String>,
    pub category: Option<String>,
    /// Case-insensitive title substring.
    pub search: Option<String>,
}

impl Default for ListJobsOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            location: None,
            category: None,
            search: None,
        }
    }
}

/// One page of open jobs plus pagination totals.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

/// List open jobs, newest first, with optional filters.
pub fn list_jobs(conn: &Connection, opts: &ListJobsOptions) -> Result<JobPage> {
    let mut clauses = vec!["status = 'open'".to_string()];
    let mut params: Vec<String> = Vec::new();

    if let Some(ref location) = opts.location {
        clauses.push("location LIKE ?".to_string());
        params.push(format!("%{location}%"));
    }
    if let Some(ref category) = opts.category {
        clauses.push("category = ?".to_string());
        params.push(category.clone());
    }
    if let Some(ref search) = opts.search {
        clauses.push("title LIKE ?".to_string());
        params.push(format!("%{search}%"));
    }

    let where_clause = clauses.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM jobs WHERE {where_clause}"),
        rusqlite::params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let page = opts.page.max(1);
    let limit = opts.limit.max(1);
    let offset = (page as i64 - 1) * limit as i64;

    let sql = format!(
        "SELECT * FROM jobs WHERE {where_clause} \
         ORDER BY created_at DESC, id LIMIT {limit} OFFSET {offset}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), Job::from_row)?;

    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row?);
    }

    let pages = (total + limit as i64 - 1) / limit as i64;

    Ok(JobPage {
        jobs,
        total,
        page,
        pages,
    })
}

/// Open jobs within `radius_m` of `origin`, nearest first; distance ties
/// break by earliest `created_at`.
///
/// The SQL side only pre-filters with a coordinate bounding box; the exact
/// haversine check and the ordering happen here.
pub fn jobs_within(
    conn: &Connection,
    origin: Point,
    radius_m: f64,
    limit: usize,
    category: Option<&str>,
) -> Result<Vec<(Job, f64)>> {
    let lat_delta = radius_m / 111_320.0;
    let lat_min = (origin.latitude - lat_delta).max(-90.0);
    let lat_max = (origin.latitude + lat_delta).min(90.0);

    let cos_lat = origin
        .latitude
        .abs()
        .max(lat_min.abs())
        .max(lat_max.abs())
        .to_radians()
        .cos();

    let mut sql = format!(
        "SELECT * FROM jobs WHERE status = 'open' \
         AND latitude IS NOT NULL AND longitude IS NOT NULL \
         AND latitude BETWEEN {lat_min} AND {lat_max}"
    );

    // Near the poles the box covers every longitude; otherwise constrain it,
    // splitting the clause when the box crosses the antimeridian.
    if cos_lat >= 1e-3 {
        let lon_delta = radius_m / (111_320.0 * cos_lat);
        let lon_min = origin.longitude - lon_delta;
        let lon_max = origin.longitude + lon_delta;
        if lon_min < -180.0 || lon_max > 180.0 {
            let wrapped_min = if lon_min < -180.0 { lon_min + 360.0 } else { lon_min };
            let wrapped_max = if lon_max > 180.0 { lon_max - 360.0 } else { lon_max };
            sql.push_str(&format!(
                " AND (longitude >= {wrapped_min} OR longitude <= {wrapped_max})"
            ));
        } else {
            sql.push_str(&format!(" AND longitude BETWEEN {lon_min} AND {lon_max}"));
        }
    }

    let mut params: Vec<String> = Vec::new();
    if let Some(category) = category {
        sql.push_str(" AND category = ?");
        params.push(category.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), Job::from_row)?;

    let mut matched: Vec<(Job, f64)> = Vec::new();
    for row in rows {
        let job = row?;
        let Some(point) = job.point() else { continue };
        let distance = origin.distance_m(&point);
        if distance <= radius_m {
            matched.push((job, distance));
        }
    }

    matched.sort_by(|a, b| {
        a.1.total_cmp(&b.1)
            .then_with(|| a.0.created_at.cmp(&b.0.created_at))
    });
    matched.truncate(limit);
    Ok(matched)
}

/// A job-density bucket for the heatmap endpoint. Coordinates are rounded
/// to two decimal places (~1.1 km).
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HeatmapBucket {
    pub latitude: f64,
    pub longitude: f64,
    pub count: i64,
}

/// Density of open jobs grouped on a rounded coordinate grid.
pub fn job_heatmap(conn: &Connection) -> Result<Vec<HeatmapBucket>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT ROUND(latitude, 2) AS lat, ROUND(longitude, 2) AS lon, COUNT(*) AS n
        FROM jobs
        WHERE status = 'open' AND latitude IS NOT NULL AND longitude IS NOT NULL
        GROUP BY lat, lon
        ORDER BY n DESC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(HeatmapBucket {
            latitude: row.get("lat")?,
            longitude: row.get("lon")?,
            count: row.get("n")?,
        })
    })?;

    let mut buckets = Vec::new();
    for row in rows {
        buckets.push(row?);
    }
    Ok(buckets)
}

/// A worker profile as visible to this service. The billing flow owns the
/// tier; onboarding owns the rest.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct WorkerProfile {
    pub id: String,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub subscriber_tier: Tier,
    pub rating: Option<f64>,
}

impl WorkerProfile {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let tier: String = row.get("subscriber_tier")?;
        Ok(Self {
            id: row.get("id")?,
            phone: row.get("phone")?,
            display_name: row.get("display_name")?,
            subscriber_tier: Tier::from_str_lossy(&tier),
            rating: row.get("rating")?,
        })
    }
}

/// Resolve a profile from a bearer token.
pub fn profile_by_token(conn: &Connection, token: &str) -> Result<Option<WorkerProfile>> {
    let mut stmt = conn.prepare(
        "SELECT id, phone, display_name, subscriber_tier, rating \
         FROM worker_profiles WHERE api_token = ?",
    )?;
    let mut rows = stmt.query_map([token], WorkerProfile::from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Fetch a profile by worker id.
pub fn profile_by_id(conn: &Connection, id: &str) -> Result<Option<WorkerProfile>> {
    let mut stmt = conn.prepare(
        "SELECT id, phone, display_name, subscriber_tier, rating \
         FROM worker_profiles WHERE id = ?",
    )?;
    let mut rows = stmt.query_map([id], WorkerProfile::from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Resolve a profile from a messaging-channel phone number.
pub fn profile_by_phone(conn: &Connection, phone: &str) -> Result<Option<WorkerProfile>> {
    let mut stmt = conn.prepare(
        "SELECT id, phone, display_name, subscriber_tier, rating \
         FROM worker_profiles WHERE phone = ?",
    )?;
    let mut rows = stmt.query_map([phone], WorkerProfile::from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Insert a profile row. Used by operational tooling and tests; production
/// profiles arrive through the onboarding flow.
pub fn insert_profile(
    conn: &Connection,
    profile: &WorkerProfile,
    api_token: Option<&str>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO worker_profiles (id, phone, display_name, subscriber_tier, rating, api_token)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        rusqlite::params![
            profile.id,
            profile.phone,
            profile.display_name,
            profile.subscriber_tier.as_str(),
            profile.rating,
            api_token,
        ],
    )?;
    Ok(())
}

/// Catalog statistics for the `info` command.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_jobs: i64,
    pub open_jobs: i64,
    pub filled_jobs: i64,
    pub closed_jobs: i64,
    pub geocoded_jobs: i64,
    pub total_profiles: i64,
    pub premium_profiles: i64,
    pub newest_job: Option<DateTime<Utc>>,
}

pub fn get_stats(conn: &Connection) -> Result<CatalogStats> {
    let count = |sql: &str| -> Result<i64> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };

    let newest_ts: Option<i64> =
        conn.query_row("SELECT MAX(created_at) FROM jobs", [], |row| row.get(0))?;

    Ok(CatalogStats {
        total_jobs: count("SELECT COUNT(*) FROM jobs")?,
        open_jobs: count("SELECT COUNT(*) FROM jobs WHERE status = 'open'")?,
        filled_jobs: count("SELECT COUNT(*) FROM jobs WHERE status = 'filled'")?,
        closed_jobs: count("SELECT COUNT(*) FROM jobs WHERE status = 'closed'")?,
        geocoded_jobs: count("SELECT COUNT(*) FROM jobs WHERE latitude IS NOT NULL")?,
        total_profiles: count("SELECT COUNT(*) FROM worker_profiles")?,
        premium_profiles: count(
            "SELECT COUNT(*) FROM worker_profiles WHERE subscriber_tier = 'premium'",
        )?,
        newest_job: newest_ts.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::tempdir;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn new_job(title: &str, lat: Option<f64>, lon: Option<f64>) -> NewJob {
        NewJob {
            title: title.to_string(),
            employer_id: Some("emp-1".to_string()),
            employer_name: "Patil Farms".to_string(),
            phone: "+919812345678".to_string(),
            location: "Shivajinagar, Pune".to_string(),
            latitude: lat,
            longitude: lon,
            salary_per_day: 650.0,
            job_type: JobType::Daily,
            category: "harvest".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let (_dir, db) = test_db();
        let job = insert_job(db.connection(), &new_job("Sugarcane cutting", Some(18.52), Some(73.85)), Utc::now()).unwrap();

        let fetched = get_job(db.connection(), &job.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Sugarcane cutting");
        assert_eq!(fetched.status, JobStatus::Open);
        assert_eq!(fetched.latitude, Some(18.52));
        assert_eq!(fetched.created_at, job.created_at);
    }

    #[test]
    fn test_get_unknown_job_is_none() {
        let (_dir, db) = test_db();
        assert!(get_job(db.connection(), "nope").unwrap().is_none());
    }

    #[test]
    fn test_update_patch_merges_fields() {
        let (_dir, db) = test_db();
        let job = insert_job(db.connection(), &new_job("Weeding", None, None), Utc::now()).unwrap();

        let patch = JobPatch {
            salary_per_day: Some(800.0),
            status: Some(JobStatus::Filled),
            ..Default::default()
        };
        let updated = update_job(db.connection(), &job.id, &patch).unwrap().unwrap();
        assert_eq!(updated.salary_per_day, 800.0);
        assert_eq!(updated.status, JobStatus::Filled);
        // Untouched fields survive.
        assert_eq!(updated.title, "Weeding");
    }

    #[test]
    fn test_update_unknown_job_is_none() {
        let (_dir, db) = test_db();
        let patch = JobPatch {
            title: Some("x".to_string()),
            ..Default::default()
        };
        assert!(update_job(db.connection(), "nope", &patch).unwrap().is_none());
    }

    #[test]
    fn test_delete_job() {
        let (_dir, db) = test_db();
        let job = insert_job(db.connection(), &new_job("Weeding", None, None), Utc::now()).unwrap();
        assert!(delete_job(db.connection(), &job.id).unwrap());
        assert!(!delete_job(db.connection(), &job.id).unwrap());
        assert!(get_job(db.connection(), &job.id).unwrap().is_none());
    }

    #[test]
    fn test_list_pagination_totals() {
        let (_dir, db) = test_db();
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for i in 0..25 {
            insert_job(
                db.connection(),
                &new_job(&format!("Job {i}"), None, None),
                base + chrono::Duration::seconds(i),
            )
            .unwrap();
        }

        let page = list_jobs(
            db.connection(),
            &ListJobsOptions {
                page: 2,
                limit: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.pages, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.jobs.len(), 10);
        // Newest first: page 2 starts at the 11th newest.
        assert_eq!(page.jobs[0].title, "Job 14");
    }

    #[test]
    fn test_list_excludes_non_open() {
        let (_dir, db) = test_db();
        let job = insert_job(db.connection(), &new_job("Weeding", None, None), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("Sowing", None, None), Utc::now()).unwrap();
        update_job(
            db.connection(),
            &job.id,
            &JobPatch {
                status: Some(JobStatus::Closed),
                ..Default::default()
            },
        )
        .unwrap();

        let page = list_jobs(db.connection(), &ListJobsOptions::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.jobs[0].title, "Sowing");
    }

    #[test]
    fn test_list_filters() {
        let (_dir, db) = test_db();
        let mut plowing = new_job("Plowing with tractor", None, None);
        plowing.category = "machinery".to_string();
        plowing.location = "Nashik".to_string();
        insert_job(db.connection(), &plowing, Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("Harvest help", None, None), Utc::now()).unwrap();

        let by_category = list_jobs(
            db.connection(),
            &ListJobsOptions {
                category: Some("machinery".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_category.total, 1);

        let by_search = list_jobs(
            db.connection(),
            &ListJobsOptions {
                search: Some("tractor".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_search.total, 1);

        let by_location = list_jobs(
            db.connection(),
            &ListJobsOptions {
                location: Some("nash".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_location.total, 1);
    }

    #[test]
    fn test_jobs_within_radius_and_ordering() {
        let (_dir, db) = test_db();
        let origin = Point::new(18.52, 73.85).unwrap();
        insert_job(db.connection(), &new_job("Near", Some(18.521), Some(73.851)), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("Mid", Some(18.54), Some(73.85)), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("Far", Some(18.7), Some(73.85)), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("No coords", None, None), Utc::now()).unwrap();

        let matches = jobs_within(db.connection(), origin, 5_000.0, 10, None).unwrap();
        let titles: Vec<_> = matches.iter().map(|(j, _)| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Near", "Mid"]);
        assert!((100.0..300.0).contains(&matches[0].1));
        for (_, d) in &matches {
            assert!(*d <= 5_000.0);
        }
    }

    #[test]
    fn test_jobs_within_excludes_filled() {
        let (_dir, db) = test_db();
        let origin = Point::new(18.52, 73.85).unwrap();
        let job = insert_job(db.connection(), &new_job("Near", Some(18.521), Some(73.851)), Utc::now()).unwrap();
        update_job(
            db.connection(),
            &job.id,
            &JobPatch {
                status: Some(JobStatus::Filled),
                ..Default::default()
            },
        )
        .unwrap();

        let matches = jobs_within(db.connection(), origin, 50_000.0, 10, None).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_jobs_within_distance_tie_breaks_by_created_at() {
        let (_dir, db) = test_db();
        let origin = Point::new(18.52, 73.85).unwrap();
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        // Same coordinates, different creation times, inserted newest-first.
        insert_job(db.connection(), &new_job("Newer", Some(18.53), Some(73.85)), base + chrono::Duration::hours(1)).unwrap();
        insert_job(db.connection(), &new_job("Older", Some(18.53), Some(73.85)), base).unwrap();

        let matches = jobs_within(db.connection(), origin, 5_000.0, 10, None).unwrap();
        let titles: Vec<_> = matches.iter().map(|(j, _)| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Older", "Newer"]);
    }

    #[test]
    fn test_jobs_within_category_filter() {
        let (_dir, db) = test_db();
        let origin = Point::new(18.52, 73.85).unwrap();
        let mut irrigation = new_job("Drip setup", Some(18.521), Some(73.851));
        irrigation.category = "irrigation".to_string();
        insert_job(db.connection(), &irrigation, Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("Harvest", Some(18.522), Some(73.852)), Utc::now()).unwrap();

        let matches = jobs_within(db.connection(), origin, 5_000.0, 10, Some("irrigation")).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0.title, "Drip setup");
    }

    #[test]
    fn test_heatmap_groups_by_rounded_coords() {
        let (_dir, db) = test_db();
        insert_job(db.connection(), &new_job("A", Some(18.521), Some(73.851)), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("B", Some(18.519), Some(73.849)), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("C", Some(19.0), Some(74.0)), Utc::now()).unwrap();

        let buckets = job_heatmap(db.connection()).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].count, 2);
    }

    #[test]
    fn test_profile_lookup_by_token_and_phone() {
        let (_dir, db) = test_db();
        let profile = WorkerProfile {
            id: "w-1".to_string(),
            phone: Some("+919900112233".to_string()),
            display_name: Some("Sita".to_string()),
            subscriber_tier: Tier::Premium,
            rating: Some(4.6),
        };
        insert_profile(db.connection(), &profile, Some("tok-abc")).unwrap();

        let by_token = profile_by_token(db.connection(), "tok-abc").unwrap().unwrap();
        assert_eq!(by_token.id, "w-1");
        assert_eq!(by_token.subscriber_tier, Tier::Premium);

        let by_phone = profile_by_phone(db.connection(), "+919900112233").unwrap().unwrap();
        assert_eq!(by_phone.id, "w-1");

        assert!(profile_by_token(db.connection(), "bogus").unwrap().is_none());
        assert!(profile_by_phone(db.connection(), "+910000000000").unwrap().is_none());
    }

    #[test]
    fn test_stats_counts() {
        let (_dir, db) = test_db();
        let job = insert_job(db.connection(), &new_job("A", Some(18.52), Some(73.85)), Utc::now()).unwrap();
        insert_job(db.connection(), &new_job("B", None, None), Utc::now()).unwrap();
        update_job(
            db.connection(),
            &job.id,
            &JobPatch {
                status: Some(JobStatus::Filled),
                ..Default::default()
            },
        )
        .unwrap();
        insert_profile(
            db.connection(),
            &WorkerProfile {
                id: "w-1".to_string(),
                phone: None,
                display_name: None,
                subscriber_tier: Tier::Free,
                rating: None,
            },
            None,
        )
        .unwrap();

        let stats = get_stats(db.connection()).unwrap();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.open_jobs, 1);
        assert_eq!(stats.filled_jobs, 1);
        assert_eq!(stats.geocoded_jobs, 1);
        assert_eq!(stats.total_profiles, 1);
        assert_eq!(stats.premium_profiles, 0);
        assert!(stats.newest_job.is_some());
    }
}
