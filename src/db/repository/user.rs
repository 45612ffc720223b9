//! User Repository

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::User;

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, email, name, role FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}
