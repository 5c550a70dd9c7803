use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::booking::{BookedRide, Booking, SeatCommit};
use ridepool_domain::repository::{BookingRepository, RepoError};
use ridepool_domain::ride::{departure_instant, Ride};
use ridepool_domain::user::UserProfile;

use crate::ride_repo::{ride_from_row, RideRow, RIDE_COLUMNS};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    passenger_id: Uuid,
    idempotency_key: String,
    created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookedRideRow {
    ride_id: Uuid,
    date: NaiveDate,
    time: String,
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn commit_booking(&self, booking: &Booking) -> Result<SeatCommit, RepoError> {
        let mut tx = self.pool.begin().await?;

        // Conditional decrement inside the transaction: two racing bookings
        // cannot both take the last seat.
        let sql = format!(
            "UPDATE rides SET available_seats = available_seats - 1, updated_at = NOW() \
             WHERE id = $1 AND status = 'active' AND available_seats > 0 \
             RETURNING {}",
            RIDE_COLUMNS
        );
        let row: Option<RideRow> = sqlx::query_as(&sql)
            .bind(booking.ride_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(SeatCommit::Full);
        };

        let inserted = sqlx::query(
            "INSERT INTO bookings (id, ride_id, passenger_id, idempotency_key, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(booking.passenger_id)
        .bind(&booking.idempotency_key)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(SeatCommit::Confirmed(ride_from_row(row)?))
            }
            // One booking per passenger per ride (or a reused idempotency
            // key). Rolling back restores the decremented seat.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tx.rollback().await?;
                Ok(SeatCommit::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_user_bookings(
        &self,
        passenger_id: Uuid,
    ) -> Result<Vec<(Booking, Ride)>, RepoError> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT id, ride_id, passenger_id, idempotency_key, created_at \
             FROM bookings WHERE passenger_id = $1 ORDER BY created_at DESC",
        )
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let ride_row: Option<RideRow> = sqlx::query_as(
                "SELECT id, from_location, to_location, from_lat, from_lng, to_lat, to_lng, \
                 date, time, total_seats, available_seats, price, driver_user_id, driver_name, \
                 driver_phone, driver_email, driver_rating, vehicle_model, vehicle_color, \
                 vehicle_plate, notes, status, created_at, updated_at \
                 FROM rides WHERE id = $1",
            )
            .bind(row.ride_id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(ride_row) = ride_row {
                bookings.push((row.into(), ride_from_row(ride_row)?));
            }
        }
        Ok(bookings)
    }

    async fn booked_rides(&self, passenger_id: Uuid) -> Result<Vec<BookedRide>, RepoError> {
        let rows: Vec<BookedRideRow> = sqlx::query_as(
            "SELECT b.ride_id, r.date, r.time FROM bookings b \
             JOIN rides r ON r.id = b.ride_id \
             WHERE b.passenger_id = $1",
        )
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BookedRide {
                ride_id: row.ride_id,
                departure_at: departure_instant(row.date, &row.time),
            })
            .collect())
    }

    async fn find_active_passenger(
        &self,
        ride_id: Uuid,
    ) -> Result<Option<UserProfile>, RepoError> {
        // First booking holds the passenger slot of the live session.
        let row: Option<(Uuid, String, Option<String>, Option<String>, f64)> = sqlx::query_as(
            "SELECT u.id, u.name, u.email, u.phone, u.rating FROM bookings b \
             JOIN users u ON u.id = b.passenger_id \
             WHERE b.ride_id = $1 ORDER BY b.created_at ASC LIMIT 1",
        )
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name, email, phone, rating)| UserProfile {
            id,
            name,
            email,
            phone,
            rating,
        }))
    }
}
