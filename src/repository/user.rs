//! User repository — the slice of the user table the workflows touch.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{User, UserRole};
use crate::schema::users;

use super::diesel_models::{NewUser, UserRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::now_ts;

pub struct UserRepository {
    pool: AsyncSqlitePool,
}

impl UserRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        id: &str,
        name: &str,
        role: UserRole,
        school_id: Option<&str>,
    ) -> Result<User, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_ts();
        diesel::insert_into(users::table)
            .values(NewUser {
                id,
                name,
                role: role.as_str(),
                school_id,
                created_at: &now,
                updated_at: &now,
            })
            .execute(&mut conn)
            .await?;
        self.get(id).await?.ok_or(DieselError::NotFound)
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<UserRecord> = users::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(User::from))
    }

    /// All user ids — the expansion set for send-to-all notifications.
    pub async fn all_ids(&self) -> Result<Vec<String>, DieselError> {
        let mut conn = self.pool.get().await?;
        users::table.select(users::id).load(&mut conn).await
    }
}
