use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use uuid::Uuid;

use crate::{
    models::message::{BookingMessage, SendMessageReq},
    relay::ChatEvent,
    state::AppState,
    utils::{errorhandler::AppError, jwt::verify_auth_token},
};

use super::bookings::load_booking;

pub async fn send_message(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<SendMessageReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = load_booking(&state.pg, booking_id).await?;

    if !booking.is_party(claims.id) {
        return Err(AppError::forbidden(
            "only the guest or the host can message on this booking",
        ));
    }

    let content = payload.content.filter(|c| !c.trim().is_empty());
    if content.is_none() && payload.file_url.is_none() {
        return Err(AppError::bad_request("message needs content or a file"));
    }

    let message = sqlx::query_as::<_, BookingMessage>(
        r#"
        INSERT INTO messages (booking_id, sender_id, content, file_url)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(claims.id)
    .bind(&content)
    .bind(&payload.file_url)
    .fetch_one(&state.pg)
    .await
    .map_err(AppError::from)?;

    //persisted above; a failed broadcast only costs the live notification
    let listeners = state.relay.publish(ChatEvent::from(&message));
    if listeners == 0 {
        warn!("no live listeners for booking {}", booking_id);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": message
        })),
    ))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = load_booking(&state.pg, booking_id).await?;

    if !booking.is_party(claims.id) {
        return Err(AppError::forbidden(
            "only the guest or the host can read this conversation",
        ));
    }

    let messages = sqlx::query_as::<_, BookingMessage>(
        "SELECT * FROM messages WHERE booking_id = $1 ORDER BY sent_at",
    )
    .bind(booking_id)
    .fetch_all(&state.pg)
    .await
    .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "data": messages
    })))
}

/// Marks everything the other party wrote as read.
pub async fn mark_messages_read(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = load_booking(&state.pg, booking_id).await?;

    if !booking.is_party(claims.id) {
        return Err(AppError::forbidden(
            "only the guest or the host can update this conversation",
        ));
    }

    let result = sqlx::query(
        r#"
        UPDATE messages SET read = true
        WHERE booking_id = $1 AND sender_id <> $2 AND read = false
        "#,
    )
    .bind(booking_id)
    .bind(claims.id)
    .execute(&state.pg)
    .await
    .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "updated": result.rows_affected()
        }
    })))
}

pub async fn stream_messages(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = load_booking(&state.pg, booking_id).await?;

    if !booking.is_party(claims.id) {
        return Err(AppError::forbidden(
            "only the guest or the host can listen on this booking",
        ));
    }

    let mut rx = state.relay.subscribe(booking_id);

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(chat_event) => {
                    match Event::default().json_data(&chat_event) {
                        Ok(event) => yield Ok::<Event, Infallible>(event),
                        Err(e) => warn!("failed to encode chat event: {}", e),
                    }
                }
                //a slow consumer missed some messages; they stay in the log
                Err(RecvError::Lagged(skipped)) => {
                    warn!("chat stream lagged, {} events skipped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
