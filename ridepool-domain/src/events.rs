use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideBookedEvent {
    pub ride_id: Uuid,
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub seats_remaining: i32,
    pub booked_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideCancelledEvent {
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub cancelled_at: i64,
}
