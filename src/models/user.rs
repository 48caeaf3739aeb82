use serde::{Deserialize, Serialize};

use sqlx::{Type, prelude::FromRow};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    #[sqlx(rename = "guest")]
    #[serde(rename = "guest")]
    Guest,
    #[sqlx(rename = "host")]
    #[serde(rename = "host")]
    Host,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Serialize, FromRow)]
pub struct GetUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize, Validate)]
pub struct RegisterUser {
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}
