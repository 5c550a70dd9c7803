use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ride::Ride;

/// Minimum gap between two of a passenger's booked departures.
pub const CONFLICT_WINDOW_MINUTES: i64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Projection of an existing booking, enough for conflict checks.
#[derive(Debug, Clone)]
pub struct BookedRide {
    pub ride_id: Uuid,
    pub departure_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BookingCandidate {
    pub ride_id: Uuid,
    pub departure_at: DateTime<Utc>,
    pub available_seats: i32,
}

/// Outcome of the transactional seat commit: the seat decrement and the
/// booking row succeed or fail together.
#[derive(Debug, Clone)]
pub enum SeatCommit {
    /// Seat taken and booking row written; the ride reflects the decrement.
    Confirmed(Ride),
    /// No seat left, or the ride is inactive or gone.
    Full,
    /// This passenger already holds a booking on the ride (or the
    /// idempotency key was reused); the seat was rolled back.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingConflict {
    #[error("already_booked")]
    AlreadyBooked,
    #[error("time_conflict: overlaps booked ride {conflicting_ride_id}")]
    TimeConflict { conflicting_ride_id: Uuid },
    #[error("ride_full")]
    RideFull,
}

impl BookingConflict {
    pub fn reason(&self) -> &'static str {
        match self {
            BookingConflict::AlreadyBooked => "already_booked",
            BookingConflict::TimeConflict { .. } => "time_conflict",
            BookingConflict::RideFull => "ride_full",
        }
    }
}

/// Decide whether the caller may book the candidate ride given their
/// existing bookings. Runs authoritatively at commit time on the server;
/// clients may call the same function for previews.
pub fn check_bookable(
    candidate: &BookingCandidate,
    existing: &[BookedRide],
) -> Result<(), BookingConflict> {
    if existing.iter().any(|b| b.ride_id == candidate.ride_id) {
        return Err(BookingConflict::AlreadyBooked);
    }
    if candidate.available_seats <= 0 {
        return Err(BookingConflict::RideFull);
    }
    let window = Duration::minutes(CONFLICT_WINDOW_MINUTES);
    for booked in existing {
        let gap = (candidate.departure_at - booked.departure_at).abs();
        if gap < window {
            return Err(BookingConflict::TimeConflict {
                conflicting_ride_id: booked.ride_id,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 14, 6, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn candidate(minutes: i64, seats: i32) -> BookingCandidate {
        BookingCandidate {
            ride_id: Uuid::new_v4(),
            departure_at: at(minutes),
            available_seats: seats,
        }
    }

    #[test]
    fn accepts_when_clear_of_both_bookings() {
        let existing = vec![
            BookedRide { ride_id: Uuid::new_v4(), departure_at: at(0) },
            BookedRide { ride_id: Uuid::new_v4(), departure_at: at(90) },
        ];
        // 220 minutes out is >= 120 from both existing departures.
        assert!(check_bookable(&candidate(220, 2), &existing).is_ok());
    }

    #[test]
    fn rejects_inside_conflict_window_naming_the_ride() {
        let near = Uuid::new_v4();
        let existing = vec![BookedRide { ride_id: near, departure_at: at(0) }];
        let err = check_bookable(&candidate(100, 2), &existing).unwrap_err();
        assert_eq!(err, BookingConflict::TimeConflict { conflicting_ride_id: near });
    }

    #[test]
    fn exact_window_boundary_is_allowed() {
        let existing = vec![BookedRide { ride_id: Uuid::new_v4(), departure_at: at(0) }];
        assert!(check_bookable(&candidate(120, 1), &existing).is_ok());
    }

    #[test]
    fn rejects_double_booking() {
        let cand = candidate(500, 2);
        let existing = vec![BookedRide { ride_id: cand.ride_id, departure_at: at(0) }];
        assert_eq!(
            check_bookable(&cand, &existing),
            Err(BookingConflict::AlreadyBooked)
        );
    }

    #[test]
    fn full_ride_rejected_even_with_time_conflicts_present() {
        let existing = vec![BookedRide { ride_id: Uuid::new_v4(), departure_at: at(30) }];
        assert_eq!(
            check_bookable(&candidate(40, 0), &existing),
            Err(BookingConflict::RideFull)
        );
    }

    #[test]
    fn no_existing_bookings_is_bookable() {
        assert!(check_bookable(&candidate(0, 1), &[]).is_ok());
    }
}
