use crate::error::{Result, StoreError};
use crate::sample::PositionSample;
use crate::summary::{
    compute_splits, elevation_gain, ActivitySummary, GpsQuality, SportType, SPLIT_METERS,
};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sport_type TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL,
        distance_meters REAL NOT NULL,
        avg_pace REAL,
        sample_count INTEGER NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS route_points (
        activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
        seq INTEGER NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        timestamp_ms INTEGER NOT NULL,
        speed_mps REAL,
        accuracy_m REAL,
        elevation_m REAL,
        segment_start BOOLEAN NOT NULL DEFAULT 0,
        PRIMARY KEY (activity_id, seq)
    );

    CREATE INDEX IF NOT EXISTS idx_activities_start_time ON activities(start_time);
"#;

/// One row of the activity history
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub id: i64,
    pub sport_type: SportType,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_meters: f64,
    pub avg_pace: Option<f64>,
    pub sample_count: usize,
}

/// SQLite store of finished activities and their routes
#[derive(Debug)]
pub struct ActivityDb {
    conn: Connection,
}

fn timestamp_text(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: i64, text: &str) -> std::result::Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id,
            reason: format!("bad timestamp {text:?}: {e}"),
        })
}

fn parse_sport(id: i64, text: &str) -> std::result::Result<SportType, StoreError> {
    <SportType as ValueEnum>::from_str(text, true).map_err(|_| StoreError::Corrupt {
        id,
        reason: format!("unknown sport {text:?}"),
    })
}

impl ActivityDb {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening activity database");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Persist a finished activity with its full route. Returns the new id.
    pub fn save_summary(&mut self, summary: &ActivitySummary) -> Result<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO activities
            (sport_type, start_time, end_time, duration_seconds, distance_meters, avg_pace,
             sample_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                summary.sport_type.to_string(),
                timestamp_text(&summary.start_time),
                timestamp_text(&summary.end_time),
                summary.duration_seconds as i64,
                summary.distance_meters,
                summary.avg_pace,
                summary.sample_count as i64,
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO route_points
                (activity_id, seq, latitude, longitude, timestamp_ms, speed_mps, accuracy_m,
                 elevation_m, segment_start)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for (seq, p) in summary.route_points.iter().enumerate() {
                stmt.execute(params![
                    id,
                    seq as i64,
                    p.latitude,
                    p.longitude,
                    p.timestamp_ms,
                    p.speed_mps,
                    p.accuracy_m,
                    p.elevation_m,
                    summary.segment_starts.contains(&seq),
                ])?;
            }
        }

        tx.commit()?;
        info!(
            id,
            sport = %summary.sport_type,
            points = summary.route_points.len(),
            "activity saved"
        );
        Ok(id)
    }

    /// Load an activity exactly as it was saved
    pub fn load_summary(&self, id: i64) -> Result<ActivitySummary> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT sport_type, start_time, end_time, duration_seconds, distance_meters,
                       avg_pace, sample_count
                FROM activities WHERE id = ?1
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, Option<f64>>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()?;
        let Some((sport, start, end, duration, distance, avg_pace, sample_count)) = row else {
            return Err(StoreError::NotFound(id).into());
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT latitude, longitude, timestamp_ms, speed_mps, accuracy_m, elevation_m,
                   segment_start
            FROM route_points WHERE activity_id = ?1
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map([id], |row| {
            Ok((
                PositionSample {
                    latitude: row.get(0)?,
                    longitude: row.get(1)?,
                    timestamp_ms: row.get(2)?,
                    speed_mps: row.get(3)?,
                    accuracy_m: row.get(4)?,
                    elevation_m: row.get(5)?,
                },
                row.get::<_, bool>(6)?,
            ))
        })?;

        let mut route_points = Vec::new();
        let mut segment_starts = Vec::new();
        for (seq, row) in rows.enumerate() {
            let (point, starts_segment) = row?;
            if starts_segment {
                segment_starts.push(seq);
            }
            route_points.push(point);
        }

        if route_points.len() as i64 != sample_count {
            return Err(StoreError::Corrupt {
                id,
                reason: format!(
                    "expected {sample_count} route points, found {}",
                    route_points.len()
                ),
            }
            .into());
        }

        Ok(ActivitySummary {
            sport_type: parse_sport(id, &sport)?,
            start_time: parse_timestamp(id, &start)?,
            end_time: parse_timestamp(id, &end)?,
            duration_seconds: duration.max(0) as u64,
            distance_meters: distance,
            avg_pace,
            sample_count: route_points.len(),
            splits: compute_splits(&route_points, &segment_starts, SPLIT_METERS),
            elevation_gain_m: elevation_gain(&route_points, &segment_starts),
            gps_quality: GpsQuality::from_route(&route_points),
            segment_starts,
            route_points,
        })
    }

    /// Every stored activity, newest first
    pub fn list_activities(&self) -> Result<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, sport_type, start_time, duration_seconds, distance_meters, avg_pace,
                   sample_count
            FROM activities
            ORDER BY start_time DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, sport, start, duration, distance, avg_pace, samples) = row?;
            records.push(ActivityRecord {
                id,
                sport_type: parse_sport(id, &sport)?,
                start_time: parse_timestamp(id, &start)?,
                duration_seconds: duration.max(0) as u64,
                distance_meters: distance,
                avg_pace,
                sample_count: samples.max(0) as usize,
            });
        }
        Ok(records)
    }

    /// Remove an activity and its route
    pub fn delete_activity(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM route_points WHERE activity_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM activities WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(id).into());
        }
        tx.commit()?;
        info!(id, "activity deleted");
        Ok(())
    }

    pub fn activity_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}
