use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::repository::{RepoError, UserRepository};
use ridepool_domain::user::UserProfile;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepoError> {
        let row: Option<(Uuid, String, Option<String>, Option<String>, f64)> =
            sqlx::query_as("SELECT id, name, email, phone, rating FROM users WHERE id = $1")
                .bind(id)
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

    async fn ensure_user(&self, profile: &UserProfile) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, rating) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email, \
             phone = EXCLUDED.phone",
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(profile.rating)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
