use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::ride::{Ride, RideStatus};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RideSearchQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<NaiveDate>,
    pub passengers: Option<i32>,
}

impl RideSearchQuery {
    /// An empty query is the "browse all" mode.
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.date.is_none() && self.passengers.is_none()
    }
}

/// Inclusive calendar-day window over departure instants:
/// [00:00:00.000, 23:59:59.999].
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

/// Pure counterpart of the store filter, used by client previews and tests.
pub fn matches(query: &RideSearchQuery, ride: &Ride) -> bool {
    if ride.status != RideStatus::Active {
        return false;
    }
    if let Some(from) = &query.from {
        if !ride
            .from_location
            .to_lowercase()
            .contains(&from.to_lowercase())
        {
            return false;
        }
    }
    if let Some(to) = &query.to {
        if !ride.to_location.to_lowercase().contains(&to.to_lowercase()) {
            return false;
        }
    }
    if let Some(date) = query.date {
        let (start, end) = day_bounds(date);
        let departure = ride.departure_instant();
        if departure < start || departure > end {
            return false;
        }
    }
    if let Some(passengers) = query.passengers {
        if ride.available_seats < passengers {
            return false;
        }
    }
    true
}

/// Ascending by price; `sort_by_key` is stable, so ties keep store order.
pub fn sort_by_price(rides: &mut [Ride]) {
    rides.sort_by_key(|r| r.price);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ride::{DriverInfo, DEFAULT_DRIVER_RATING};
    use uuid::Uuid;

    fn ride(from: &str, to: &str, time: &str, seats: i32, price: i64) -> Ride {
        Ride {
            id: Uuid::new_v4(),
            from_location: from.into(),
            to_location: to.into(),
            from_geo: None,
            to_geo: None,
            date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            time: time.into(),
            total_seats: 4,
            available_seats: seats,
            price,
            driver: DriverInfo {
                user_id: Uuid::new_v4(),
                name: "Asha".into(),
                phone: "+91-98200-00000".into(),
                email: None,
                rating: DEFAULT_DRIVER_RATING,
            },
            vehicle: None,
            notes: None,
            status: RideStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let query = RideSearchQuery {
            from: Some("pune".into()),
            ..Default::default()
        };
        assert!(matches(&query, &ride("Pune Station", "Mumbai", "08:00", 2, 100)));
        assert!(!matches(&query, &ride("Nashik", "Mumbai", "08:00", 2, 100)));
    }

    #[test]
    fn date_window_is_inclusive_at_end_of_day() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();
        let (start, end) = day_bounds(date);

        let last_moment = date.and_time(NaiveTime::MIN).and_utc()
            + Duration::hours(23)
            + Duration::minutes(59)
            + Duration::seconds(59)
            + Duration::milliseconds(999);
        assert!(last_moment >= start && last_moment <= end);

        let next_midnight = date.succ_opt().unwrap().and_time(NaiveTime::MIN).and_utc();
        assert!(next_midnight > end);
    }

    #[test]
    fn passenger_count_filters_seats() {
        let query = RideSearchQuery {
            passengers: Some(3),
            ..Default::default()
        };
        assert!(matches(&query, &ride("A", "B", "08:00", 3, 100)));
        assert!(!matches(&query, &ride("A", "B", "08:00", 2, 100)));
    }

    #[test]
    fn inactive_rides_never_match() {
        let mut r = ride("A", "B", "08:00", 2, 100);
        r.status = RideStatus::Cancelled;
        assert!(!matches(&RideSearchQuery::default(), &r));
    }

    #[test]
    fn price_sort_is_stable_on_ties() {
        let cheap_first = ride("A", "B", "08:00", 2, 100);
        let cheap_second = ride("C", "D", "09:00", 2, 100);
        let pricey = ride("E", "F", "10:00", 2, 300);
        let mut rides = vec![pricey.clone(), cheap_first.clone(), cheap_second.clone()];
        // Keep insertion order among equal prices.
        let mut ordered = vec![cheap_first, cheap_second, pricey];
        sort_by_price(&mut rides);
        sort_by_price(&mut ordered);
        assert_eq!(
            rides.iter().map(|r| r.price).collect::<Vec<_>>(),
            vec![100, 100, 300]
        );
        assert_eq!(ordered[0].from_location, "A");
        assert_eq!(ordered[1].from_location, "C");
    }
}
