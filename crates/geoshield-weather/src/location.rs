//! Location groups read from the `Location` table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use geoshield_core::{group_locations, LocationGroup, LocationSource, RawLocation};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};

/// Reads raw points (latitude, longitude, suburb_id) and groups them by suburb.
#[derive(Clone)]
pub struct SqliteLocationSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLocationSource {
    /// Open an existing database read-only.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// All raw points. Rows without a suburb are skipped; coordinates that
    /// are not numeric come back as `None`.
    pub fn raw_locations(&self) -> rusqlite::Result<Vec<RawLocation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT latitude, longitude, suburb_id FROM Location")?;

        let rows = stmt.query_map([], |row| {
            let latitude: SqlValue = row.get(0)?;
            let longitude: SqlValue = row.get(1)?;
            let suburb: SqlValue = row.get(2)?;
            Ok((as_number(&latitude), as_number(&longitude), as_group_id(&suburb)))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (latitude, longitude, group_id) = row?;
            if let Some(group_id) = group_id {
                points.push(RawLocation {
                    group_id,
                    latitude,
                    longitude,
                });
            }
        }
        Ok(points)
    }
}

fn as_number(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Integer(i) => Some(*i as f64),
        SqlValue::Real(f) => Some(*f),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_group_id(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        // Suburb ids stored as REAL (e.g. 12.0) after a float round-trip
        SqlValue::Real(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        _ => None,
    }
}

#[async_trait]
impl LocationSource for SqliteLocationSource {
    async fn list_location_groups(&self) -> anyhow::Result<Vec<LocationGroup>> {
        let source = self.clone();
        let points = tokio::task::spawn_blocking(move || source.raw_locations()).await??;
        let total = points.len();
        let groups = group_locations(points);
        tracing::debug!("Grouped {} location rows into {} groups", total, groups.len());
        Ok(groups)
    }
}
