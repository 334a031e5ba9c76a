//! Integration tests for the rozgar CLI.
//!
//! These verify CLI behavior end-to-end against a seeded test database.

use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use tempfile::tempdir;

use rozgar::db::Database;
use rozgar::db::queries::{self, JobPatch, JobStatus, JobType, NewJob, WorkerProfile};
use rozgar::tier::Tier;

/// Get a command for the rozgar binary.
fn rozgar() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("rozgar").unwrap()
}

/// Create a test database with a few postings and profiles.
fn create_test_db(path: &std::path::Path) {
    let db = Database::open(path).unwrap();

    let near = queries::insert_job(
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
            description: Some("Two weeks of field work".to_string()),
        },
        Utc::now(),
    )
    .unwrap();

    queries::insert_job(
        db.connection(),
        &NewJob {
            title: "Dairy helper".to_string(),
            employer_id: None,
            employer_name: "Gokul Dairy".to_string(),
            phone: "+919812340000".to_string(),
            location: "Kolhapur".to_string(),
            latitude: None,
            longitude: None,
            salary_per_day: 500.0,
            job_type: JobType::Monthly,
            category: "dairy".to_string(),
            description: None,
        },
        Utc::now(),
    )
    .unwrap();

    queries::update_job(
        db.connection(),
        &near.id,
        &JobPatch {
            status: Some(JobStatus::Filled),
            ..Default::default()
        },
    )
    .unwrap();

    queries::insert_profile(
        db.connection(),
        &WorkerProfile {
            id: "w-1".to_string(),
            phone: Some("+919900112233".to_string()),
            display_name: Some("Ramu".to_string()),
            subscriber_tier: Tier::Premium,
            rating: Some(4.5),
        },
        Some("tok-w1"),
    )
    .unwrap();
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays() {
    rozgar()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("job matching"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_version_displays() {
    rozgar()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_serve_help_lists_tuning_flags() {
    rozgar()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--rate-limit-max"))
        .stdout(predicate::str::contains("--freshness-secs"));
}

// ============================================================================
// Info Tests
// ============================================================================

#[test]
fn test_info_reports_catalog_stats() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    create_test_db(&db_path);

    rozgar()
        .args(["--db-path", db_path.to_str().unwrap(), "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total jobs"))
        .stdout(predicate::str::contains("Worker profiles"))
        .stdout(predicate::str::contains("Premium profiles"));
}

#[test]
fn test_info_missing_database_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("absent.db");

    rozgar()
        .args(["--db-path", db_path.to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database"));
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    rozgar()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rozgar"));
}

#[test]
fn test_completions_zsh() {
    rozgar()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rozgar"));
}

// ============================================================================
// Argument Validation Tests
// ============================================================================

#[test]
fn test_unknown_subcommand_fails() {
    rozgar().arg("frobnicate").assert().failure();
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    rozgar().args(["-v", "-q", "info"]).assert().failure();
}
