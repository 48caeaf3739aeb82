use axum::{Json, extract::State, http::StatusCode};
use bcrypt::{hash, verify};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tracing::warn;
use validator::Validate;

use crate::{
    models::user::{GetUser, LoginUser, RegisterUser, Role, User},
    state::AppState,
    utils::{
        errorhandler::AppError,
        jwt::{AccessRole, Claims, jwt_secret},
    },
};

fn token_for(user_id: uuid::Uuid, email: String, role: Role) -> Result<String, AppError> {
    let token_expiry_hours: u64 = std::env::var("TOKEN_EXPIRY_HOURS")
        .ok()
        .and_then(|h| h.parse().ok())
        .unwrap_or(24);

    let exp = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| AppError::Unexpected)?
        .as_secs()
        + (token_expiry_hours * 3600)) as usize;

    let access_role = match role {
        Role::Guest => AccessRole::Guest,
        Role::Host => AccessRole::Host,
    };

    let claims = Claims {
        id: user_id,
        sub: email,
        role: access_role,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
    .map_err(|e| {
        warn!("JWT encoding failed: {}", e);
        AppError::Unexpected
    })
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUser>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let hashed = hash(&payload.password, 12).map_err(|e| {
        warn!("Password hashing failed: {}", e);
        AppError::Unexpected
    })?;

    //unique index on email turns duplicates into a 409
    let user = sqlx::query_as::<_, GetUser>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING user_id, name, email, role
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&hashed)
    .bind(payload.role)
    .fetch_one(&state.pg)
    .await
    .map_err(AppError::from)?;

    let token = token_for(user.user_id, user.email.clone(), user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "token": token,
                "user": user
            }
        })),
    ))
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<Value>, AppError> {

    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("invalid credentials"));
    }
    if payload.password.trim().is_empty() {
        return Err(AppError::bad_request("invalid credentials"));
    }

    let user_opt = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&state.pg)
        .await
        .map_err(|e| {
            warn!("Database error fetching user: {}", e);
            AppError::database("Failed to fetch user")
        })?;

    let user = match user_opt {
        Some(u) => u,
        None => {
            warn!("Failed login attempt: no user for email: {}", payload.email);
            return Err(AppError::unauthorized("invalid credentials"));
        }
    };

    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("invalid credentials"))?;

    if !valid {
        warn!("Failed login attempt: invalid password for email: {}", payload.email);
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = token_for(user.user_id, user.email, user.role)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token
        }
    })))
}
