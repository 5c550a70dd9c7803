use std::sync::Arc;

use ridepool_domain::repository::{
    AttemptStore, BookingRepository, ChatRepository, RideRepository, UserRepository,
};
use ridepool_hub::CoordinationHub;
use ridepool_store::app_config::BusinessRules;
use ridepool_store::{EventProducer, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub rides: Arc<dyn RideRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub users: Arc<dyn UserRepository>,
    /// Booking idempotency claims; Redis-backed in production.
    pub attempts: Arc<dyn AttemptStore>,
    pub redis: Arc<RedisClient>,
    pub kafka: Arc<EventProducer>,
    pub hub: Arc<CoordinationHub>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
