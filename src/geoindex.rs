//! In-memory geospatial index of live worker positions.
//!
//! Positions land in a fixed-degree cell grid (0.05° ≈ 5.5 km at the
//! equator) so radius queries only touch the cells covered by the search
//! circle's bounding box, then re-check candidates with the exact haversine
//! distance. The index is sharded by worker id hash: updates from unrelated
//! workers take different locks, and radius queries take short read locks
//! per shard.
//!
//! Rows are never deleted. A worker that stops pinging goes stale and is
//! filtered out by every read path once `last_updated` falls outside the
//! freshness window; an explicit `is_online = false` upsert removes it from
//! the feed immediately.

use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::feed::FeedEvent;
use crate::geo::Point;

/// Grid cell edge in degrees.
const CELL_SIZE_DEG: f64 = 0.05;

/// Longitude cells per full circle (360 / CELL_SIZE_DEG).
const LON_CELLS: i32 = 7_200;

/// Shards for the worker map. Power of two, sized for tens of thousands of
/// concurrently-online workers.
const SHARD_COUNT: usize = 16;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEG: f64 = 111_320.0;

/// Default freshness window: a location older than this is treated as
/// offline by readers. The reference client pings every 10 seconds, so ten
/// minutes means roughly sixty missed pings.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(600);

/// Current known position of a worker.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct WorkerLocation {
    pub worker_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_online: bool,
    pub last_updated: DateTime<Utc>,
}

/// A worker matched by a radius query.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct WorkerHit {
    pub worker_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Haversine distance from the query origin.
    pub distance_m: f64,
}

type Cell = (i32, i32);

#[derive(Default)]
struct Shard {
    workers: HashMap<String, WorkerLocation>,
    cells: HashMap<Cell, HashSet<String>>,
}

/// Sharded cell-grid index over online workers.
pub struct GeoIndex {
    shards: Vec<RwLock<Shard>>,
    freshness: TimeDelta,
    feed: broadcast::Sender<FeedEvent>,
}

impl GeoIndex {
    pub fn new(freshness: Duration, feed: broadcast::Sender<FeedEvent>) -> Self {
        let freshness = TimeDelta::from_std(freshness).unwrap_or(TimeDelta::seconds(600));
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(Shard::default())).collect(),
            freshness,
            feed,
        }
    }

    /// Insert or replace a worker's position.
    ///
    /// Within one worker's stream, later timestamps win: an update carrying
    /// an older `last_updated` than the stored row is ignored and `false`
    /// is returned. Applied changes are published to the live feed.
    pub fn upsert(
        &self,
        worker_id: &str,
        point: Point,
        online: bool,
        at: DateTime<Utc>,
    ) -> bool {
        let location = WorkerLocation {
            worker_id: worker_id.to_string(),
            latitude: point.latitude,
            longitude: point.longitude,
            is_online: online,
            last_updated: at,
        };

        {
            let mut shard = self.shard_for(worker_id).write().expect("geoindex lock poisoned");
            let new_cell = cell_of(point.latitude, point.longitude);

            let prev_cell = match shard.workers.get(worker_id) {
                Some(existing) if existing.last_updated > at => return false,
                Some(existing) => Some(cell_of(existing.latitude, existing.longitude)),
                None => None,
            };
            if let Some(old_cell) = prev_cell {
                if old_cell != new_cell {
                    let emptied = match shard.cells.get_mut(&old_cell) {
                        Some(ids) => {
                            ids.remove(worker_id);
                            ids.is_empty()
                        }
                        None => false,
                    };
                    if emptied {
                        shard.cells.remove(&old_cell);
                    }
                }
            }

            shard
                .cells
                .entry(new_cell)
                .or_default()
                .insert(worker_id.to_string());
            shard.workers.insert(worker_id.to_string(), location.clone());
        }

        let event = if online {
            FeedEvent::Upsert { worker: location }
        } else {
            FeedEvent::Remove {
                worker_id: worker_id.to_string(),
            }
        };
        let _ = self.feed.send(event);
        true
    }

    /// Explicit sign-off: keep the last known position but flag the worker
    /// offline and emit a remove event. No-op for unknown workers.
    pub fn mark_offline(&self, worker_id: &str, at: DateTime<Utc>) {
        let changed = {
            let mut shard = self.shard_for(worker_id).write().expect("geoindex lock poisoned");
            match shard.workers.get_mut(worker_id) {
                Some(existing) if existing.last_updated <= at => {
                    existing.is_online = false;
                    existing.last_updated = at;
                    true
                }
                _ => false,
            }
        };
        if changed {
            let _ = self.feed.send(FeedEvent::Remove {
                worker_id: worker_id.to_string(),
            });
        }
    }

    /// Online, fresh workers within `radius_m` of `origin`, nearest first,
    /// capped at `limit`.
    pub fn query_radius(&self, origin: Point, radius_m: f64, limit: usize) -> Vec<WorkerHit> {
        self.query_radius_at(origin, radius_m, limit, Utc::now())
    }

    fn query_radius_at(
        &self,
        origin: Point,
        radius_m: f64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<WorkerHit> {
        let cells = covering_cells(origin, radius_m);
        let mut hits = Vec::new();

        for shard in &self.shards {
            let shard = shard.read().expect("geoindex lock poisoned");
            for cell in &cells {
                let Some(ids) = shard.cells.get(cell) else {
                    continue;
                };
                for id in ids {
                    let Some(loc) = shard.workers.get(id) else {
                        continue;
                    };
                    if !self.is_visible(loc, now) {
                        continue;
                    }
                    let distance =
                        origin.distance_m(&Point { latitude: loc.latitude, longitude: loc.longitude });
                    if distance <= radius_m {
                        hits.push(WorkerHit {
                            worker_id: loc.worker_id.clone(),
                            latitude: loc.latitude,
                            longitude: loc.longitude,
                            distance_m: distance,
                        });
                    }
                }
            }
        }

        hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        hits.truncate(limit);
        hits
    }

    /// All online, fresh workers — the live feed's initial snapshot.
    pub fn snapshot(&self) -> Vec<WorkerLocation> {
        self.snapshot_at(Utc::now())
    }

    fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<WorkerLocation> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().expect("geoindex lock poisoned");
            out.extend(
                shard
                    .workers
                    .values()
                    .filter(|loc| self.is_visible(loc, now))
                    .cloned(),
            );
        }
        out.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        out
    }

    /// Count of online, fresh workers.
    pub fn online_count(&self) -> usize {
        let now = Utc::now();
        self.shards
            .iter()
            .map(|shard| {
                let shard = shard.read().expect("geoindex lock poisoned");
                shard
                    .workers
                    .values()
                    .filter(|loc| self.is_visible(loc, now))
                    .count()
            })
            .sum()
    }

    /// Look up a single worker's stored row, fresh or not.
    pub fn get(&self, worker_id: &str) -> Option<WorkerLocation> {
        let shard = self.shard_for(worker_id).read().expect("geoindex lock poisoned");
        shard.workers.get(worker_id).cloned()
    }

    fn is_visible(&self, loc: &WorkerLocation, now: DateTime<Utc>) -> bool {
        loc.is_online && now.signed_duration_since(loc.last_updated) <= self.freshness
    }

    fn shard_for(&self, worker_id: &str) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        worker_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }
}

fn cell_of(lat: f64, lon: f64) -> Cell {
    (
        (lat / CELL_SIZE_DEG).floor() as i32,
        wrap_lon_cell((lon / CELL_SIZE_DEG).floor() as i32),
    )
}

fn wrap_lon_cell(cell: i32) -> i32 {
    (cell + LON_CELLS / 2).rem_euclid(LON_CELLS) - LON_CELLS / 2
}

/// Grid cells covered by the bounding box of a search circle.
///
/// The longitude span uses the widest parallel inside the latitude band;
/// when the band reaches a pole the whole circle of longitudes is included,
/// so no in-radius point can be missed.
fn covering_cells(origin: Point, radius_m: f64) -> Vec<Cell> {
    let lat_delta = radius_m / METERS_PER_DEG;
    let lat_min = (origin.latitude - lat_delta).max(-90.0);
    let lat_max = (origin.latitude + lat_delta).min(90.0);

    let widest_lat = lat_min.abs().max(lat_max.abs());
    let cos_lat = widest_lat.to_radians().cos();
    let touches_pole = lat_max >= 90.0 - 1e-9 || lat_min <= -90.0 + 1e-9 || cos_lat < 1e-3;

    let lat_lo = (lat_min / CELL_SIZE_DEG).floor() as i32;
    let lat_hi = (lat_max / CELL_SIZE_DEG).floor() as i32;

    let (lon_lo, lon_hi) = if touches_pole {
        (-LON_CELLS / 2, LON_CELLS / 2 - 1)
    } else {
        let lon_delta = radius_m / (METERS_PER_DEG * cos_lat);
        (
            ((origin.longitude - lon_delta) / CELL_SIZE_DEG).floor() as i32,
            ((origin.longitude + lon_delta) / CELL_SIZE_DEG).floor() as i32,
        )
    };

    let mut cells = HashSet::new();
    for lat_c in lat_lo..=lat_hi {
        for lon_c in lon_lo..=lon_hi {
            cells.insert((lat_c, wrap_lon_cell(lon_c)));
        }
    }
    cells.into_iter().collect()
}
