use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{BookedRide, Booking, SeatCommit};
use crate::chat::ChatMessage;
use crate::ride::{Ride, RideUpdate};
use crate::search::RideSearchQuery;
use crate::user::UserProfile;

pub type RepoError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for ride documents.
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn create_ride(&self, ride: &Ride) -> Result<(), RepoError>;

    async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>, RepoError>;

    /// Availability-filtered search, sorted ascending by price with stable
    /// ties. Always restricted to active rides.
    async fn search_rides(&self, query: &RideSearchQuery) -> Result<Vec<Ride>, RepoError>;

    /// Owner-gated wholesale update. Returns `None` when the ride is missing
    /// OR owned by someone else; callers must not distinguish the two.
    async fn update_ride(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: &RideUpdate,
    ) -> Result<Option<Ride>, RepoError>;

    /// Owner-gated cancellation; also retracts the id from the owner's ride
    /// list. Returns false when missing or not owned by the caller.
    async fn cancel_ride(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepoError>;
}

/// Repository trait for passenger bookings.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Atomically take one seat (decrement-if-positive) and write the
    /// booking row in a single transaction. A duplicate booking rolls the
    /// seat back instead of leaking it.
    async fn commit_booking(&self, booking: &Booking) -> Result<SeatCommit, RepoError>;

    async fn list_user_bookings(&self, passenger_id: Uuid)
        -> Result<Vec<(Booking, Ride)>, RepoError>;

    /// Projection used by the conflict checker.
    async fn booked_rides(&self, passenger_id: Uuid) -> Result<Vec<BookedRide>, RepoError>;

    /// The ride's active passenger, established at booking time. A ride with
    /// no booking has no passenger slot.
    async fn find_active_passenger(&self, ride_id: Uuid)
        -> Result<Option<UserProfile>, RepoError>;
}

/// Durable chat log behind the coordination hub.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), RepoError>;

    async fn ride_history(&self, ride_id: Uuid) -> Result<Vec<ChatMessage>, RepoError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepoError>;

    async fn ensure_user(&self, profile: &UserProfile) -> Result<(), RepoError>;
}

/// Idempotency claims guarding the booking commit path.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// The first claim for a key wins; a replay sees `false` and must not
    /// decrement seats again.
    async fn claim_attempt(
        &self,
        key: &str,
        owner: &str,
        ttl_seconds: u64,
    ) -> Result<bool, RepoError>;

    /// Frees a claim after a failed commit so the key may be retried.
    async fn release_attempt(&self, key: &str) -> Result<(), RepoError>;
}
