use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use ridepool_domain::repository::{RepoError, RideRepository};
use ridepool_domain::ride::{DriverInfo, GeoPoint, Ride, RideStatus, RideUpdate, Vehicle};
use ridepool_domain::search::RideSearchQuery;

pub struct PgRideRepository {
    pool: PgPool,
}

impl PgRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const RIDE_COLUMNS: &str = "id, from_location, to_location, from_lat, from_lng, to_lat, to_lng, \
     date, time, total_seats, available_seats, price, driver_user_id, driver_name, driver_phone, \
     driver_email, driver_rating, vehicle_model, vehicle_color, vehicle_plate, notes, status, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct RideRow {
    id: Uuid,
    from_location: String,
    to_location: String,
    from_lat: Option<f64>,
    from_lng: Option<f64>,
    to_lat: Option<f64>,
    to_lng: Option<f64>,
    date: NaiveDate,
    time: String,
    total_seats: i32,
    available_seats: i32,
    price: i64,
    driver_user_id: Uuid,
    driver_name: String,
    driver_phone: String,
    driver_email: Option<String>,
    driver_rating: f64,
    vehicle_model: Option<String>,
    vehicle_color: Option<String>,
    vehicle_plate: Option<String>,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn geo(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    }
}

pub(crate) fn ride_from_row(row: RideRow) -> Result<Ride, RepoError> {
    let status = RideStatus::parse(&row.status)
        .ok_or_else(|| format!("unknown ride status: {}", row.status))?;
    Ok(Ride {
        id: row.id,
        from_location: row.from_location,
        to_location: row.to_location,
        from_geo: geo(row.from_lat, row.from_lng),
        to_geo: geo(row.to_lat, row.to_lng),
        date: row.date,
        time: row.time,
        total_seats: row.total_seats,
        available_seats: row.available_seats,
        price: row.price,
        driver: DriverInfo {
            user_id: row.driver_user_id,
            name: row.driver_name,
            phone: row.driver_phone,
            email: row.driver_email,
            rating: row.driver_rating,
        },
        vehicle: row.vehicle_model.map(|model| Vehicle {
            model,
            color: row.vehicle_color,
            plate: row.vehicle_plate,
        }),
        notes: row.notes,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl RideRepository for PgRideRepository {
    async fn create_ride(&self, ride: &Ride) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO rides (id, from_location, to_location, from_lat, from_lng, to_lat, to_lng,
                date, time, total_seats, available_seats, price, driver_user_id, driver_name,
                driver_phone, driver_email, driver_rating, vehicle_model, vehicle_color,
                vehicle_plate, notes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(ride.id)
        .bind(&ride.from_location)
        .bind(&ride.to_location)
        .bind(ride.from_geo.map(|g| g.lat))
        .bind(ride.from_geo.map(|g| g.lng))
        .bind(ride.to_geo.map(|g| g.lat))
        .bind(ride.to_geo.map(|g| g.lng))
        .bind(ride.date)
        .bind(&ride.time)
        .bind(ride.total_seats)
        .bind(ride.available_seats)
        .bind(ride.price)
        .bind(ride.driver.user_id)
        .bind(&ride.driver.name)
        .bind(&ride.driver.phone)
        .bind(&ride.driver.email)
        .bind(ride.driver.rating)
        .bind(ride.vehicle.as_ref().map(|v| v.model.clone()))
        .bind(ride.vehicle.as_ref().and_then(|v| v.color.clone()))
        .bind(ride.vehicle.as_ref().and_then(|v| v.plate.clone()))
        .bind(&ride.notes)
        .bind(ride.status.as_str())
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&mut *tx)
        .await?;

        // Owner's published-ride list stays in step with ride rows.
        sqlx::query("INSERT INTO user_rides (user_id, ride_id) VALUES ($1, $2)")
            .bind(ride.driver.user_id)
            .bind(ride.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>, RepoError> {
        let row: Option<RideRow> =
            sqlx::query_as(&format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ride_from_row).transpose()
    }

    async fn search_rides(&self, query: &RideSearchQuery) -> Result<Vec<Ride>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM rides WHERE status = 'active'",
            RIDE_COLUMNS
        ));
        if let Some(from) = &query.from {
            qb.push(" AND from_location ILIKE ");
            qb.push_bind(format!("%{}%", from));
        }
        if let Some(to) = &query.to {
            qb.push(" AND to_location ILIKE ");
            qb.push_bind(format!("%{}%", to));
        }
        if let Some(date) = query.date {
            // DATE equality is exactly the inclusive calendar-day window.
            qb.push(" AND date = ");
            qb.push_bind(date);
        }
        if let Some(passengers) = query.passengers {
            qb.push(" AND available_seats >= ");
            qb.push_bind(passengers);
        }
        qb.push(" ORDER BY price ASC, created_at ASC");

        let rows: Vec<RideRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ride_from_row).collect()
    }

    async fn update_ride(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: &RideUpdate,
    ) -> Result<Option<Ride>, RepoError> {
        let driver = update.driver.as_ref();
        // The WHERE clause carries the ownership check so a non-owner edit
        // and a missing ride are indistinguishable (zero rows either way).
        // driver_user_id is never in the SET list: ownership cannot be
        // reassigned through an edit.
        let sql = format!(
            r#"
            UPDATE rides SET
                from_location = $3,
                to_location = $4,
                from_lat = $5, from_lng = $6, to_lat = $7, to_lng = $8,
                date = $9, time = $10,
                total_seats = $11, available_seats = $12, price = $13,
                driver_name = COALESCE($14, driver_name),
                driver_phone = COALESCE($15, driver_phone),
                driver_email = CASE WHEN $14::TEXT IS NULL THEN driver_email ELSE $16 END,
                driver_rating = COALESCE($17, driver_rating),
                vehicle_model = $18, vehicle_color = $19, vehicle_plate = $20,
                notes = $21,
                updated_at = NOW()
            WHERE id = $1 AND driver_user_id = $2
            RETURNING {}
            "#,
            RIDE_COLUMNS
        );

        let row: Option<RideRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(&update.from_location)
            .bind(&update.to_location)
            .bind(update.from_geo.map(|g| g.lat))
            .bind(update.from_geo.map(|g| g.lng))
            .bind(update.to_geo.map(|g| g.lat))
            .bind(update.to_geo.map(|g| g.lng))
            .bind(update.date)
            .bind(&update.time)
            .bind(update.total_seats)
            .bind(update.available_seats)
            .bind(update.price)
            .bind(driver.map(|d| d.name.clone()))
            .bind(driver.map(|d| d.phone.clone()))
            .bind(driver.and_then(|d| d.email.clone()))
            .bind(driver.and_then(|d| d.rating))
            .bind(update.vehicle.as_ref().map(|v| v.model.clone()))
            .bind(update.vehicle.as_ref().and_then(|v| v.color.clone()))
            .bind(update.vehicle.as_ref().and_then(|v| v.plate.clone()))
            .bind(&update.notes)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ride_from_row).transpose()
    }

    async fn cancel_ride(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE rides SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND driver_user_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        // Retract from the owner's ride list in the same transaction.
        sqlx::query("DELETE FROM user_rides WHERE ride_id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
