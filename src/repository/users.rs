use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{NewUser, User};
use crate::schema::users;

use super::{with_conn, StoreResult, UserRepository};

#[derive(Clone)]
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
    async fn create(&self, email: &str, password_hash: &str) -> StoreResult<Option<User>> {
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        with_conn(&self.pool, move |conn| {
            let inserted = diesel::insert_into(users::table)
                .values(&new_user)
                .execute(conn);
            match inserted {
                Ok(_) => {}
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    return Ok(None)
                }
                Err(err) => return Err(err.into()),
            }
            let user = users::table
                .find(new_user.id)
                .select(User::as_select())
                .first(conn)?;
            Ok(Some(user))
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(users::table
                .filter(users::email.eq(&email))
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        with_conn(&self.pool, move |conn| {
            Ok(users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn count(&self) -> StoreResult<i64> {
        with_conn(&self.pool, |conn| Ok(users::table.count().get_result(conn)?)).await
    }
}
