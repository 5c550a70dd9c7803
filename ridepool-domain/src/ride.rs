use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::UserProfile;
use crate::{DomainError, DomainResult};

pub const DEFAULT_DRIVER_RATING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverInfo {
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub model: String,
    pub color: Option<String>,
    pub plate: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Active,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(RideStatus::Active),
            "in_progress" => Some(RideStatus::InProgress),
            "completed" => Some(RideStatus::Completed),
            "cancelled" => Some(RideStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub from_location: String,
    pub to_location: String,
    pub from_geo: Option<GeoPoint>,
    pub to_geo: Option<GeoPoint>,
    pub date: NaiveDate,
    /// Departure time of day, "HH:MM" or "HH:MM:SS".
    pub time: String,
    pub total_seats: i32,
    pub available_seats: i32,
    /// Price per seat in minor currency units.
    pub price: i64,
    pub driver: DriverInfo,
    pub vehicle: Option<Vehicle>,
    pub notes: Option<String>,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    /// Departure instant used for conflict windows and day filtering.
    pub fn departure_instant(&self) -> DateTime<Utc> {
        departure_instant(self.date, &self.time)
    }
}

/// Combine a ride's calendar date and time-of-day string into an instant.
/// An unparseable time falls back to midnight rather than failing a search.
pub fn departure_instant(date: NaiveDate, time: &str) -> DateTime<Utc> {
    let tod = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .unwrap_or(NaiveTime::MIN);
    date.and_time(tod).and_utc()
}

/// Displayed status for a viewer: explicit cancellation always wins, a past
/// ride still marked active reads as completed, a same-day ride as in
/// progress. Never persisted.
pub fn derived_status(stored: RideStatus, ride_date: NaiveDate, today: NaiveDate) -> RideStatus {
    match stored {
        RideStatus::Cancelled => RideStatus::Cancelled,
        RideStatus::Completed => RideStatus::Completed,
        RideStatus::Active | RideStatus::InProgress => {
            if ride_date < today {
                RideStatus::Completed
            } else if ride_date == today {
                RideStatus::InProgress
            } else {
                RideStatus::Active
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRideRequest {
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub from_geo: Option<GeoPoint>,
    pub to_geo: Option<GeoPoint>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub available_seats: Option<i32>,
    pub price: Option<i64>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_email: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub notes: Option<String>,
}

fn missing(field: &str) -> DomainError {
    DomainError::ValidationError(format!("missing required field: {}", field))
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).is_some_and(|s| !s.is_empty())
}

impl CreateRideRequest {
    /// Required ride fields, checked before any driver-profile fallback.
    pub fn validate(&self) -> DomainResult<()> {
        if !present(&self.from_location) {
            return Err(missing("from"));
        }
        if !present(&self.to_location) {
            return Err(missing("to"));
        }
        if self.date.is_none() {
            return Err(missing("date"));
        }
        if !present(&self.time) {
            return Err(missing("time"));
        }
        match self.available_seats {
            None => return Err(missing("available_seats")),
            Some(n) if n <= 0 => {
                return Err(DomainError::ValidationError(
                    "available_seats must be positive".into(),
                ))
            }
            Some(_) => {}
        }
        if self.price.is_none() {
            return Err(missing("price"));
        }
        Ok(())
    }

    /// Driver sub-record for a new ride. Contact fields fall back to the
    /// owner's stored profile; the owning user id is always the caller.
    pub fn resolve_driver(&self, owner: &UserProfile) -> DomainResult<DriverInfo> {
        let name = self
            .driver_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| owner.name.clone());
        let phone = self
            .driver_phone
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| owner.phone.clone());
        if name.trim().is_empty() {
            return Err(missing("driver.name"));
        }
        let phone = match phone {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(missing("driver.phone")),
        };
        Ok(DriverInfo {
            user_id: owner.id,
            name,
            phone,
            email: self.driver_email.clone().or_else(|| owner.email.clone()),
            rating: DEFAULT_DRIVER_RATING,
        })
    }
}

/// Wholesale replacement payload for an owner edit. The driver sub-object is
/// optional; when present its user id is ignored in favor of the stored
/// owner, so an edit can never reassign ride ownership.
#[derive(Debug, Clone, Deserialize)]
pub struct RideUpdate {
    pub from_location: String,
    pub to_location: String,
    pub from_geo: Option<GeoPoint>,
    pub to_geo: Option<GeoPoint>,
    pub date: NaiveDate,
    pub time: String,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price: i64,
    pub driver: Option<DriverContactUpdate>,
    pub vehicle: Option<Vehicle>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverContactUpdate {
    /// Accepted on the wire, never applied.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub rating: Option<f64>,
}

impl RideUpdate {
    /// Apply this payload to a stored ride. The driver sub-object, when
    /// present, replaces contact fields only; the owning user id always
    /// survives.
    pub fn apply_to(&self, ride: &mut Ride) {
        ride.from_location = self.from_location.clone();
        ride.to_location = self.to_location.clone();
        ride.from_geo = self.from_geo;
        ride.to_geo = self.to_geo;
        ride.date = self.date;
        ride.time = self.time.clone();
        ride.total_seats = self.total_seats;
        ride.available_seats = self.available_seats;
        ride.price = self.price;
        if let Some(driver) = &self.driver {
            ride.driver.name = driver.name.clone();
            ride.driver.phone = driver.phone.clone();
            ride.driver.email = driver.email.clone();
            if let Some(rating) = driver.rating {
                ride.driver.rating = rating;
            }
        }
        ride.vehicle = self.vehicle.clone();
        ride.notes = self.notes.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CreateRideRequest {
        CreateRideRequest {
            from_location: Some("Pune".into()),
            to_location: Some("Mumbai".into()),
            from_geo: None,
            to_geo: None,
            date: NaiveDate::from_ymd_opt(2026, 9, 14),
            time: Some("08:30".into()),
            available_seats: Some(3),
            price: Some(45000),
            driver_name: None,
            driver_phone: None,
            driver_email: None,
            vehicle: None,
            notes: None,
        }
    }

    fn owner() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: "Asha".into(),
            email: Some("asha@example.com".into()),
            phone: Some("+91-98200-00000".into()),
            rating: 4.8,
        }
    }

    #[test]
    fn validate_rejects_missing_origin() {
        let mut req = base_request();
        req.from_location = Some("   ".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_seats() {
        let mut req = base_request();
        req.available_seats = Some(0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn driver_contact_falls_back_to_profile() {
        let owner = owner();
        let driver = base_request().resolve_driver(&owner).unwrap();
        assert_eq!(driver.user_id, owner.id);
        assert_eq!(driver.name, "Asha");
        assert_eq!(driver.phone, "+91-98200-00000");
        assert_eq!(driver.rating, DEFAULT_DRIVER_RATING);
    }

    #[test]
    fn driver_contact_required_when_profile_has_none() {
        let mut owner = owner();
        owner.phone = None;
        assert!(base_request().resolve_driver(&owner).is_err());
    }

    #[test]
    fn derived_status_cancellation_wins() {
        let today = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();
        let past = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert_eq!(
            derived_status(RideStatus::Cancelled, past, today),
            RideStatus::Cancelled
        );
    }

    #[test]
    fn derived_status_from_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();
        let past = NaiveDate::from_ymd_opt(2026, 9, 13).unwrap();
        let future = NaiveDate::from_ymd_opt(2026, 9, 15).unwrap();
        assert_eq!(
            derived_status(RideStatus::Active, past, today),
            RideStatus::Completed
        );
        assert_eq!(
            derived_status(RideStatus::Active, today, today),
            RideStatus::InProgress
        );
        assert_eq!(
            derived_status(RideStatus::Active, future, today),
            RideStatus::Active
        );
    }

    #[test]
    fn edit_payload_cannot_reassign_ownership() {
        let owner = owner();
        let mut ride = Ride {
            id: Uuid::new_v4(),
            from_location: "Pune".into(),
            to_location: "Mumbai".into(),
            from_geo: None,
            to_geo: None,
            date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            time: "08:30".into(),
            total_seats: 3,
            available_seats: 3,
            price: 45000,
            driver: DriverInfo {
                user_id: owner.id,
                name: owner.name.clone(),
                phone: "+91-98200-00000".into(),
                email: owner.email.clone(),
                rating: DEFAULT_DRIVER_RATING,
            },
            vehicle: None,
            notes: None,
            status: RideStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let update = RideUpdate {
            from_location: "Pune Station".into(),
            to_location: "Mumbai".into(),
            from_geo: None,
            to_geo: None,
            date: ride.date,
            time: "09:00".into(),
            total_seats: 3,
            available_seats: 2,
            price: 45000,
            driver: Some(DriverContactUpdate {
                user_id: Some(Uuid::new_v4()),
                name: "A. Kulkarni".into(),
                phone: "+91-98200-11111".into(),
                email: None,
                rating: None,
            }),
            vehicle: None,
            notes: None,
        };
        update.apply_to(&mut ride);

        assert_eq!(ride.driver.user_id, owner.id);
        assert_eq!(ride.driver.name, "A. Kulkarni");
        assert_eq!(ride.driver.email, None);
        assert_eq!(ride.from_location, "Pune Station");
    }

    #[test]
    fn departure_instant_parses_both_time_formats() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();
        assert_eq!(
            departure_instant(date, "08:30"),
            departure_instant(date, "08:30:00")
        );
    }
}
