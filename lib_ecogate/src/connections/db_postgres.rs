//! # PostgreSQL Store
//!
//! Implements the booking, observation and audit stores on a
//! `deadpool_postgres` pool. Counter paths are single transactions:
//!
//! - **Admission**: the booking row and its site row are locked with
//!   `SELECT … FOR UPDATE`, occupancy is recounted, the gate runs, and the
//!   status update plus the refreshed `current_occupancy` commit together.
//! - **Registration**: the event row is locked, duplicates and the cap are
//!   checked, then the registration insert and counter increment commit.
//! - **Eco-points**: one conditional `UPDATE … RETURNING` (or upsert for
//!   awards), so a redemption can never drive a balance negative.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Config as DeadpoolConfig, GenericClient, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::Json;
use tokio_postgres::{NoTls, Row};
use tracing::info;

use crate::models::{
    Booking, BookingStatus, CapacityAdjustment, CapacityAlert, CapacityFactors, CleanupEvent, Coordinates,
    EcoPointsOutcome, EcologicalIndicators, FactorKind, RegistrationOutcome, Site, SiteId, WeatherReading,
};
use crate::store::{
    validate_new_booking, validate_site, AdmissionGate, AuditStore, BookingStore, ObservationStore, StoreError,
    TransitionOutcome,
};

pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

const SITE_COLUMNS: &str = "id, name, location, max_capacity, current_occupancy, sensitivity, latitude, longitude";
const INDICATOR_COLUMNS: &str = "site_id, soil_compaction, vegetation_disturbance, wildlife_disturbance, \
    water_source_impact, recorded_at";
const BOOKING_COLUMNS: &str = "id, site_id, user_id, group_size, status, created_at, updated_at";
const OCCUPANCY_SQL: &str = "SELECT COALESCE(SUM(group_size), 0)::BIGINT AS occupancy FROM bookings \
     WHERE site_id = $1 AND status IN ('approved', 'checked-in')";

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn row_to_site(row: &Row) -> Result<Site, tokio_postgres::Error> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    Ok(Site {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        max_capacity: to_u32(row.try_get::<_, i32>("max_capacity")? as i64),
        current_occupancy: to_u32(row.try_get::<_, i32>("current_occupancy")? as i64),
        sensitivity: row.try_get("sensitivity")?,
        coordinates: latitude.zip(longitude).map(|(lat, lon)| Coordinates::new(lat, lon)),
    })
}

fn row_to_booking(row: &Row) -> Result<Booking, tokio_postgres::Error> {
    Ok(Booking {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        user_id: row.try_get("user_id")?,
        group_size: to_u32(row.try_get::<_, i32>("group_size")? as i64),
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_indicators(row: &Row) -> Result<EcologicalIndicators, tokio_postgres::Error> {
    Ok(EcologicalIndicators {
        site_id: row.try_get("site_id")?,
        soil_compaction: row.try_get("soil_compaction")?,
        vegetation_disturbance: row.try_get("vegetation_disturbance")?,
        wildlife_disturbance: row.try_get("wildlife_disturbance")?,
        water_source_impact: row.try_get("water_source_impact")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn row_to_event(row: &Row) -> Result<CleanupEvent, tokio_postgres::Error> {
    Ok(CleanupEvent {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        title: row.try_get("title")?,
        max_participants: to_u32(row.try_get::<_, i32>("max_participants")? as i64),
        current_participants: to_u32(row.try_get::<_, i32>("current_participants")? as i64),
        starts_at: row.try_get("starts_at")?,
    })
}

fn row_to_adjustment(row: &Row) -> Result<CapacityAdjustment, tokio_postgres::Error> {
    let Json(factors): Json<CapacityFactors> = row.try_get("factors")?;
    Ok(CapacityAdjustment {
        site_id: row.try_get("site_id")?,
        recorded_at: row.try_get("recorded_at")?,
        original_capacity: to_u32(row.try_get::<_, i32>("original_capacity")? as i64),
        adjusted_capacity: to_u32(row.try_get::<_, i32>("adjusted_capacity")? as i64),
        factors,
        reason: row.try_get("reason")?,
    })
}

fn row_to_alert(row: &Row) -> Result<CapacityAlert, tokio_postgres::Error> {
    let Json(active_factors): Json<Vec<FactorKind>> = row.try_get("active_factors")?;
    Ok(CapacityAlert {
        site_id: row.try_get("site_id")?,
        severity: row.try_get("severity")?,
        reduction_pct: row.try_get("reduction_pct")?,
        original_capacity: to_u32(row.try_get::<_, i32>("original_capacity")? as i64),
        adjusted_capacity: to_u32(row.try_get::<_, i32>("adjusted_capacity")? as i64),
        active_factors,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn recount<C: GenericClient>(client: &C, site_id: &str) -> Result<u32, StoreError> {
    let row = client.query_one(OCCUPANCY_SQL, &[&site_id]).await?;
    Ok(to_u32(row.try_get::<_, i64>("occupancy")?))
}

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `database_url`. Connections are opened lazily.
    pub fn connect(database_url: &str, max_size: usize) -> Result<Self, StoreError> {
        let mut config = DeadpoolConfig::new();
        config.url = Some(database_url.to_string());
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        config.pool = Some(deadpool_postgres::PoolConfig::new(max_size.max(1)));
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Backend(format!("failed to create database pool: {}", e)))?;
        Ok(Self { pool })
    }

    /// Applies the bundled schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        info!("Database schema applied");
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn site(&self, site_id: &str) -> Result<Option<Site>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM sites WHERE id = $1", SITE_COLUMNS);
        let row = client.query_opt(sql.as_str(), &[&site_id]).await?;
        Ok(row.as_ref().map(row_to_site).transpose()?)
    }

    async fn sites(&self) -> Result<Vec<Site>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM sites ORDER BY id", SITE_COLUMNS);
        let rows = client.query(sql.as_str(), &[]).await?;
        Ok(rows.iter().map(row_to_site).collect::<Result<Vec<_>, _>>()?)
    }

    async fn upsert_site(&self, site: Site) -> Result<(), StoreError> {
        validate_site(&site)?;
        let client = self.pool.get().await?;
        let latitude = site.coordinates.map(|c| c.latitude);
        let longitude = site.coordinates.map(|c| c.longitude);
        client
            .execute(
                "INSERT INTO sites (id, name, location, max_capacity, sensitivity, latitude, longitude) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, location = EXCLUDED.location, \
                 max_capacity = EXCLUDED.max_capacity, sensitivity = EXCLUDED.sensitivity, \
                 latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude",
                &[
                    &site.id,
                    &site.name,
                    &site.location,
                    &to_i32(site.max_capacity),
                    &site.sensitivity,
                    &latitude,
                    &longitude,
                ],
            )
            .await?;
        Ok(())
    }

    async fn booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = client.query_opt(sql.as_str(), &[&booking_id]).await?;
        Ok(row.as_ref().map(row_to_booking).transpose()?)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        validate_new_booking(&booking)?;
        let client = self.pool.get().await?;
        let exists = client
            .query_opt("SELECT id FROM sites WHERE id = $1", &[&booking.site_id])
            .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("site", booking.site_id));
        }
        client.execute(
            "INSERT INTO bookings (id, site_id, user_id, group_size, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &booking.id,
                &booking.site_id,
                &booking.user_id,
                &to_i32(booking.group_size),
                &booking.status,
                &booking.created_at,
                &booking.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn transition_booking(
        &self,
        booking_id: &str,
        next: BookingStatus,
        gate: Option<AdmissionGate<'_>>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let sql = format!("SELECT {} FROM bookings WHERE id = $1 FOR UPDATE", BOOKING_COLUMNS);
        let current = match tx.query_opt(sql.as_str(), &[&booking_id]).await? {
            Some(row) => row_to_booking(&row)?,
            None => return Err(StoreError::not_found("booking", booking_id)),
        };
        if !current.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { from: current.status, to: next });
        }

        let sql = format!("SELECT {} FROM sites WHERE id = $1 FOR UPDATE", SITE_COLUMNS);
        let mut site = match tx.query_opt(sql.as_str(), &[&current.site_id]).await? {
            Some(row) => row_to_site(&row)?,
            None => return Err(StoreError::not_found("site", current.site_id.clone())),
        };

        if current.status.requires_admission(next) {
            let gate = gate.ok_or(StoreError::GateRequired(next))?;
            let occupancy = recount(&tx, &site.id).await?;
            site.current_occupancy = occupancy;
            let decision = gate(&site, occupancy);
            if !decision.allowed {
                tx.rollback().await?;
                return Ok(TransitionOutcome::Denied { booking: current, decision });
            }
        }

        let sql = format!(
            "UPDATE bookings SET status = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = tx.query_one(sql.as_str(), &[&booking_id, &next]).await?;
        let updated = row_to_booking(&row)?;
        let occupancy = recount(&tx, &site.id).await?;
        tx.execute(
            "UPDATE sites SET current_occupancy = $2 WHERE id = $1",
            &[&site.id, &to_i32(occupancy)],
        )
        .await?;
        tx.commit().await?;
        Ok(TransitionOutcome::Committed { booking: updated, occupancy })
    }

    async fn occupancy(&self, site_id: &str) -> Result<u32, StoreError> {
        let client = self.pool.get().await?;
        let exists = client.query_opt("SELECT 1 FROM sites WHERE id = $1", &[&site_id]).await?;
        if exists.is_none() {
            return Err(StoreError::not_found("site", site_id));
        }
        recount(&client, site_id).await
    }

    async fn upsert_cleanup_event(&self, event: CleanupEvent) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO cleanup_events (id, site_id, title, max_participants, starts_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO UPDATE SET site_id = EXCLUDED.site_id, title = EXCLUDED.title, \
                 max_participants = EXCLUDED.max_participants, starts_at = EXCLUDED.starts_at",
                &[
                    &event.id,
                    &event.site_id,
                    &event.title,
                    &to_i32(event.max_participants),
                    &event.starts_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn cleanup_event(&self, event_id: &str) -> Result<Option<CleanupEvent>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, site_id, title, max_participants, current_participants, starts_at \
                 FROM cleanup_events WHERE id = $1",
                &[&event_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_event).transpose()?)
    }

    async fn register_participant(&self, event_id: &str, user_id: &str) -> Result<RegistrationOutcome, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let event = tx
            .query_opt(
                "SELECT max_participants, current_participants FROM cleanup_events WHERE id = $1 FOR UPDATE",
                &[&event_id],
            )
            .await?
            .ok_or_else(|| StoreError::not_found("cleanup event", event_id))?;
        let max = to_u32(event.try_get::<_, i32>("max_participants")? as i64);
        let current = to_u32(event.try_get::<_, i32>("current_participants")? as i64);

        let existing = tx
            .query_opt(
                "SELECT 1 FROM cleanup_registrations WHERE event_id = $1 AND user_id = $2",
                &[&event_id, &user_id],
            )
            .await?;
        if existing.is_some() {
            tx.rollback().await?;
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }
        if current >= max {
            tx.rollback().await?;
            return Ok(RegistrationOutcome::Full { max_participants: max });
        }

        tx.execute(
            "INSERT INTO cleanup_registrations (event_id, user_id) VALUES ($1, $2)",
            &[&event_id, &user_id],
        )
        .await?;
        let row = tx
            .query_one(
                "UPDATE cleanup_events SET current_participants = current_participants + 1 \
                 WHERE id = $1 RETURNING current_participants",
                &[&event_id],
            )
            .await?;
        let participants = to_u32(row.try_get::<_, i32>("current_participants")? as i64);
        tx.commit().await?;
        Ok(RegistrationOutcome::Registered { participants })
    }

    async fn cancel_registration(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let removed = tx
            .execute(
                "DELETE FROM cleanup_registrations WHERE event_id = $1 AND user_id = $2",
                &[&event_id, &user_id],
            )
            .await?;
        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.execute(
            "UPDATE cleanup_events SET current_participants = GREATEST(current_participants - 1, 0) WHERE id = $1",
            &[&event_id],
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn adjust_eco_points(&self, user_id: &str, delta: i64) -> Result<EcoPointsOutcome, StoreError> {
        let client = self.pool.get().await?;
        if delta >= 0 {
            let row = client
                .query_one(
                    "INSERT INTO eco_points (user_id, balance) VALUES ($1, $2) \
                     ON CONFLICT (user_id) DO UPDATE SET balance = eco_points.balance + EXCLUDED.balance \
                     RETURNING balance",
                    &[&user_id, &delta],
                )
                .await?;
            return Ok(EcoPointsOutcome::Applied { balance: row.try_get("balance")? });
        }

        let requested = delta.saturating_neg();
        let updated = client
            .query_opt(
                "UPDATE eco_points SET balance = balance - $2 WHERE user_id = $1 AND balance >= $2 RETURNING balance",
                &[&user_id, &requested],
            )
            .await?;
        match updated {
            Some(row) => Ok(EcoPointsOutcome::Applied { balance: row.try_get("balance")? }),
            None => {
                let balance = client
                    .query_opt("SELECT balance FROM eco_points WHERE user_id = $1", &[&user_id])
                    .await?
                    .map(|row| row.try_get::<_, i64>("balance"))
                    .transpose()?
                    .unwrap_or(0);
                Ok(EcoPointsOutcome::InsufficientBalance { balance, requested })
            }
        }
    }

    async fn eco_points(&self, user_id: &str) -> Result<i64, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT balance FROM eco_points WHERE user_id = $1", &[&user_id])
            .await?;
        Ok(row.map(|r| r.try_get::<_, i64>("balance")).transpose()?.unwrap_or(0))
    }
}

#[async_trait]
impl ObservationStore for PgStore {
    async fn latest_weather(&self, site_id: &str) -> Result<Option<WeatherReading>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT site_id, temperature_c, humidity_pct, pressure_hpa, wind_speed_ms, visibility_km, \
                 condition, alert_level, recorded_at FROM weather_readings \
                 WHERE site_id = $1 ORDER BY recorded_at DESC LIMIT 1",
                &[&site_id],
            )
            .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(WeatherReading {
            site_id: row.try_get("site_id")?,
            temperature_c: row.try_get("temperature_c")?,
            humidity_pct: row.try_get("humidity_pct")?,
            pressure_hpa: row.try_get("pressure_hpa")?,
            wind_speed_ms: row.try_get("wind_speed_ms")?,
            visibility_km: row.try_get("visibility_km")?,
            condition: row.try_get("condition")?,
            alert_level: row.try_get("alert_level")?,
            recorded_at: row.try_get("recorded_at")?,
        }))
    }

    async fn record_weather(&self, reading: &WeatherReading) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO weather_readings (site_id, temperature_c, humidity_pct, pressure_hpa, wind_speed_ms, \
                 visibility_km, condition, alert_level, recorded_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &reading.site_id,
                    &reading.temperature_c,
                    &reading.humidity_pct,
                    &reading.pressure_hpa,
                    &reading.wind_speed_ms,
                    &reading.visibility_km,
                    &reading.condition,
                    &reading.alert_level,
                    &reading.recorded_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn latest_indicators(&self, site_id: &str) -> Result<Option<EcologicalIndicators>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM ecological_indicators WHERE site_id = $1 ORDER BY recorded_at DESC LIMIT 1",
            INDICATOR_COLUMNS
        );
        let row = client.query_opt(sql.as_str(), &[&site_id]).await?;
        Ok(row.as_ref().map(row_to_indicators).transpose()?)
    }

    async fn latest_indicators_for(
        &self,
        site_ids: &[SiteId],
    ) -> Result<HashMap<SiteId, EcologicalIndicators>, StoreError> {
        if site_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT DISTINCT ON (site_id) {} FROM ecological_indicators WHERE site_id = ANY($1) \
             ORDER BY site_id, recorded_at DESC",
            INDICATOR_COLUMNS
        );
        let rows = client.query(sql.as_str(), &[&site_ids]).await?;
        rows.iter()
            .map(|row| row_to_indicators(row).map(|found| (found.site_id.clone(), found)))
            .collect::<Result<HashMap<_, _>, _>>()
            .map_err(StoreError::from)
    }

    async fn record_indicators(&self, indicators: &EcologicalIndicators) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO ecological_indicators (site_id, soil_compaction, vegetation_disturbance, \
                 wildlife_disturbance, water_source_impact, recorded_at) VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &indicators.site_id,
                    &indicators.soil_compaction,
                    &indicators.vegetation_disturbance,
                    &indicators.wildlife_disturbance,
                    &indicators.water_source_impact,
                    &indicators.recorded_at,
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_adjustment(&self, entry: &CapacityAdjustment) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO capacity_adjustments (site_id, recorded_at, original_capacity, adjusted_capacity, \
                 factors, reason) VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &entry.site_id,
                    &entry.recorded_at,
                    &to_i32(entry.original_capacity),
                    &to_i32(entry.adjusted_capacity),
                    &Json(&entry.factors),
                    &entry.reason,
                ],
            )
            .await?;
        Ok(())
    }

    async fn latest_adjustment(&self, site_id: &str) -> Result<Option<CapacityAdjustment>, StoreError> {
        Ok(self.adjustments(site_id, 1).await?.into_iter().next())
    }

    async fn adjustments(&self, site_id: &str, limit: usize) -> Result<Vec<CapacityAdjustment>, StoreError> {
        let client = self.pool.get().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(
                "SELECT site_id, recorded_at, original_capacity, adjusted_capacity, factors, reason \
                 FROM capacity_adjustments WHERE site_id = $1 ORDER BY id DESC LIMIT $2",
                &[&site_id, &limit],
            )
            .await?;
        Ok(rows.iter().map(row_to_adjustment).collect::<Result<Vec<_>, _>>()?)
    }

    async fn record_alert(&self, alert: &CapacityAlert) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO capacity_alerts (site_id, severity, reduction_pct, original_capacity, adjusted_capacity, \
                 active_factors, message, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &alert.site_id,
                    &alert.severity,
                    &alert.reduction_pct,
                    &to_i32(alert.original_capacity),
                    &to_i32(alert.adjusted_capacity),
                    &Json(&alert.active_factors),
                    &alert.message,
                    &alert.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn alerts(&self, site_id: &str, limit: usize) -> Result<Vec<CapacityAlert>, StoreError> {
        let client = self.pool.get().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(
                "SELECT site_id, severity, reduction_pct, original_capacity, adjusted_capacity, active_factors, \
                 message, created_at FROM capacity_alerts WHERE site_id = $1 ORDER BY id DESC LIMIT $2",
                &[&site_id, &limit],
            )
            .await?;
        Ok(rows.iter().map(row_to_alert).collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_conversions_saturate() {
        assert_eq!(to_i32(u32::MAX), i32::MAX);
        assert_eq!(to_u32(-5), 0);
        assert_eq!(to_u32(i64::MAX), u32::MAX);
    }

    #[test]
    fn schema_declares_every_table() {
        for table in [
            "sites",
            "bookings",
            "weather_readings",
            "ecological_indicators",
            "capacity_adjustments",
            "capacity_alerts",
            "cleanup_events",
            "cleanup_registrations",
            "eco_points",
        ] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)), "{}", table);
        }
    }
}
