use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{Value, json};
use sqlx::{PgPool, QueryBuilder};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        booking::{
            Booking, BookingQueryParams, BookingStatus, CompletePaymentReq, CreateBookingReq,
            GUEST_CANCEL_REASON, GuestCounts, HOST_CANCEL_REASON, PartyRole, PaymentIntentReq,
            PaymentMethod, PaymentStatus, PaymentWebhookEvent, UpdateStatusReq, windows_overlap,
        },
        listing::{Listing, ListingStatus},
    },
    pricing::{self, Quote},
    state::AppState,
    utils::{confirmation, errorhandler::AppError, jwt::verify_auth_token},
};

const CODE_RETRY_ATTEMPTS: usize = 5;

/// Runs the pre-booking checks in their fixed order and prices the stay.
/// Each failure is distinct so callers can tell a capacity problem from a
/// date conflict.
async fn validate_and_quote(
    pg: &PgPool,
    guest_id: Uuid,
    listing_id: Uuid,
    check_in: OffsetDateTime,
    check_out: OffsetDateTime,
    guests: &GuestCounts,
    now: OffsetDateTime,
) -> Result<(Listing, Quote), AppError> {

    pricing::validate_stay_window(check_in, check_out, now)?;

    let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_optional(pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("listing not found"))?;

    if listing.status != ListingStatus::Active {
        return Err(AppError::conflict("listing is not available for booking"));
    }

    if listing.host_id == guest_id {
        return Err(AppError::conflict("hosts cannot book their own listing"));
    }

    if guests.occupancy() > listing.max_guests {
        return Err(AppError::conflict(format!(
            "guest count {} exceeds listing capacity {}",
            guests.occupancy(),
            listing.max_guests
        )));
    }

    //friendly pre-check; the exclusion constraint still backstops races
    let held = sqlx::query_as::<_, crate::models::booking::BookedWindow>(
        r#"
        SELECT check_in, check_out FROM bookings
        WHERE listing_id = $1 AND status IN ('pending', 'confirmed')
        "#,
    )
    .bind(listing_id)
    .fetch_all(pg)
    .await
    .map_err(AppError::from)?;

    if held
        .iter()
        .any(|w| windows_overlap(check_in, check_out, w.check_in, w.check_out))
    {
        return Err(AppError::conflict(
            "listing is already booked for the selected dates",
        ));
    }

    let quote = pricing::quote(&listing, check_in, check_out);
    Ok((listing, quote))
}

#[allow(clippy::too_many_arguments)]
async fn insert_booking(
    pg: &PgPool,
    listing: &Listing,
    guest_id: Uuid,
    check_in: OffsetDateTime,
    check_out: OffsetDateTime,
    guests: &GuestCounts,
    special_requests: Option<&str>,
    quote: &Quote,
    payment_method: Option<PaymentMethod>,
    payment_status: PaymentStatus,
    payment_intent_id: Option<&str>,
    paid_at: Option<OffsetDateTime>,
    status: BookingStatus,
) -> Result<Booking, AppError> {

    let amount_paid = match payment_status {
        PaymentStatus::Completed => Some(quote.total),
        _ => None,
    };

    //codes are random; on the rare unique-index collision, regenerate
    for _ in 0..CODE_RETRY_ATTEMPTS {
        let code = confirmation::generate_code();

        let inserted = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings
                (confirmation_code, listing_id, guest_id, host_id,
                 check_in, check_out, adults, children, infants, pets,
                 base_price, nights, subtotal, cleaning_fee, service_fee,
                 taxes, weekly_discount, monthly_discount, total_price,
                 currency, special_requests, payment_method, payment_status,
                 payment_intent_id, paid_at, amount_paid, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24,
                    $25, $26, $27)
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(listing.listing_id)
        .bind(guest_id)
        .bind(listing.host_id)
        .bind(check_in)
        .bind(check_out)
        .bind(guests.adults)
        .bind(guests.children)
        .bind(guests.infants)
        .bind(guests.pets)
        .bind(quote.base_price)
        .bind(quote.nights as i32)
        .bind(quote.subtotal)
        .bind(quote.cleaning_fee)
        .bind(quote.service_fee)
        .bind(quote.taxes)
        .bind(quote.weekly_discount)
        .bind(quote.monthly_discount)
        .bind(quote.total)
        .bind(listing.currency)
        .bind(special_requests)
        .bind(payment_method)
        .bind(payment_status)
        .bind(payment_intent_id)
        .bind(paid_at)
        .bind(amount_paid)
        .bind(status)
        .fetch_one(pg)
        .await;

        match inserted {
            Ok(booking) => return Ok(booking),
            Err(sqlx::Error::Database(db))
                if db.constraint() == Some("bookings_confirmation_code_key") =>
            {
                warn!("confirmation code collision, regenerating");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::conflict("could not allocate a confirmation code"))
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<PaymentIntentReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let now = OffsetDateTime::now_utc();
    let (listing, quote) = validate_and_quote(
        &state.pg,
        claims.id,
        payload.listing_id,
        payload.check_in,
        payload.check_out,
        &payload.guests,
        now,
    )
    .await?;

    let intent = state
        .payments
        .create_intent(
            quote.total_minor_units(),
            listing.currency,
            payload.payment_method_id.as_deref(),
        )
        .await?;

    let booking = insert_booking(
        &state.pg,
        &listing,
        claims.id,
        payload.check_in,
        payload.check_out,
        &payload.guests,
        None,
        &quote,
        Some(PaymentMethod::CreditCard),
        PaymentStatus::Pending,
        Some(&intent.id),
        None,
        BookingStatus::Pending,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "client_secret": intent.client_secret,
                "booking_id": booking.booking_id,
                "payment_intent_id": intent.id,
                "status": booking.status
            }
        })),
    ))
}

pub async fn create_booking(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateBookingReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let now = OffsetDateTime::now_utc();
    let (listing, quote) = validate_and_quote(
        &state.pg,
        claims.id,
        payload.listing_id,
        payload.check_in,
        payload.check_out,
        &payload.guests,
        now,
    )
    .await?;

    //cash and upi are trust-on-submit; cards need a settled intent
    let (payment_status, status) = match payload.payment_method {
        Some(PaymentMethod::Cash) | Some(PaymentMethod::Upi) => {
            (PaymentStatus::Completed, BookingStatus::Confirmed)
        }
        Some(PaymentMethod::CreditCard) if payload.payment_intent_id.is_some() => {
            (PaymentStatus::Completed, BookingStatus::Confirmed)
        }
        _ => (PaymentStatus::Pending, BookingStatus::Pending),
    };

    let paid_at = match payment_status {
        PaymentStatus::Completed => Some(now),
        _ => None,
    };

    let booking = insert_booking(
        &state.pg,
        &listing,
        claims.id,
        payload.check_in,
        payload.check_out,
        &payload.guests,
        payload.special_requests.as_deref(),
        &quote,
        payload.payment_method,
        payment_status,
        payload.payment_intent_id.as_deref(),
        paid_at,
        status,
    )
    .await?;

    info!(
        "booking {} created for listing {} ({} nights)",
        booking.booking_id, booking.listing_id, booking.nights
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": booking
        })),
    ))
}

pub async fn get_bookings(
    State(state): State<AppState>,
    Query(params): Query<BookingQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut query_builder = QueryBuilder::new("SELECT * FROM bookings WHERE 1=1");

    match params.role {
        Some(PartyRole::Guest) => {
            query_builder.push(" AND guest_id = ");
            query_builder.push_bind(claims.id);
        }
        Some(PartyRole::Host) => {
            query_builder.push(" AND host_id = ");
            query_builder.push_bind(claims.id);
        }
        None => {
            query_builder.push(" AND (guest_id = ");
            query_builder.push_bind(claims.id);
            query_builder.push(" OR host_id = ");
            query_builder.push_bind(claims.id);
            query_builder.push(")");
        }
    }

    if let Some(status) = params.status {
        query_builder.push(" AND status = ");
        query_builder.push_bind(status);
    }

    query_builder.push(" ORDER BY created_at DESC ");
    query_builder.push(" LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let bookings = query_builder
        .build_query_as::<Booking>()
        .fetch_all(&state.pg)
        .await
        .map_err(AppError::from)?;

    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM bookings WHERE 1=1");
    match params.role {
        Some(PartyRole::Guest) => {
            count_builder.push(" AND guest_id = ");
            count_builder.push_bind(claims.id);
        }
        Some(PartyRole::Host) => {
            count_builder.push(" AND host_id = ");
            count_builder.push_bind(claims.id);
        }
        None => {
            count_builder.push(" AND (guest_id = ");
            count_builder.push_bind(claims.id);
            count_builder.push(" OR host_id = ");
            count_builder.push_bind(claims.id);
            count_builder.push(")");
        }
    }
    if let Some(status) = params.status {
        count_builder.push(" AND status = ");
        count_builder.push_bind(status);
    }

    let total_count: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&state.pg)
        .await
        .map_err(AppError::from)?;

    let response = serde_json::json!({
        "success": true,
        "data": {
            "page": page,
            "limit": limit,
            "total": total_count,
            "items": bookings
        }
    });
    Ok(Json(response))
}

pub(crate) async fn load_booking(pg: &PgPool, booking_id: Uuid) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_optional(pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("booking not found"))
}

pub async fn get_booking_by_id(
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
            "only the guest or the host can view this booking",
        ));
    }

    Ok(Json(json!({
        "success": true,
        "data": booking
    })))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateStatusReq>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = load_booking(&state.pg, booking_id).await?;

    if !booking.is_party(claims.id) {
        return Err(AppError::forbidden(
            "only the guest or the host can update this booking",
        ));
    }

    let target = payload.status;

    //who may drive which transition
    match target {
        BookingStatus::Confirmed => {
            if claims.id != booking.host_id {
                return Err(AppError::forbidden("only the host can confirm a booking"));
            }
        }
        BookingStatus::CancelledByGuest => {
            if claims.id != booking.guest_id {
                return Err(AppError::forbidden("only the guest can cancel as guest"));
            }
        }
        BookingStatus::CancelledByHost => {
            if claims.id != booking.host_id {
                return Err(AppError::forbidden("only the host can cancel as host"));
            }
        }
        BookingStatus::InProgress | BookingStatus::Completed | BookingStatus::NoShow => {
            if claims.id != booking.host_id {
                return Err(AppError::forbidden("only the host can update stay progress"));
            }
        }
        BookingStatus::Pending => {
            return Err(AppError::state("bookings cannot return to pending"));
        }
    }

    if !booking.status.can_transition_to(target) {
        return Err(AppError::state(format!(
            "cannot transition booking from {:?} to {:?}",
            booking.status, target
        )));
    }

    let now = OffsetDateTime::now_utc();

    let updated = if target.is_cancelled() {
        if !booking.can_be_cancelled(now) {
            return Err(AppError::state("booking can no longer be cancelled"));
        }

        let listing =
            sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE listing_id = $1")
                .bind(booking.listing_id)
                .fetch_one(&state.pg)
                .await
                .map_err(AppError::from)?;

        let refund = booking.compute_refund(listing.cancellation_policy, now);

        let default_reason = match target {
            BookingStatus::CancelledByGuest => GUEST_CANCEL_REASON,
            _ => HOST_CANCEL_REASON,
        };

        //refund is recorded here; the gateway moves the actual money
        let payment_status = if refund > 0.0 {
            PaymentStatus::PartiallyRefunded
        } else {
            booking.payment_status
        };

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $1, cancelled_at = $2, cancelled_by = $3,
                cancellation_reason = $4, custom_reason = $5,
                refund_amount = $6, payment_status = $7,
                version = version + 1
            WHERE booking_id = $8 AND version = $9
            RETURNING *
            "#,
        )
        .bind(target)
        .bind(now)
        .bind(claims.id)
        .bind(default_reason)
        .bind(&payload.reason)
        .bind(refund)
        .bind(payment_status)
        .bind(booking.booking_id)
        .bind(booking.version)
        .fetch_optional(&state.pg)
        .await
        .map_err(AppError::from)?;

        info!(
            "booking {} cancelled by {:?}, refund {:.2} {:?}",
            booking.booking_id, target, refund, booking.currency
        );

        updated
    } else {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $1, version = version + 1
            WHERE booking_id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(target)
        .bind(booking.booking_id)
        .bind(booking.version)
        .fetch_optional(&state.pg)
        .await
        .map_err(AppError::from)?
    };

    let booking = updated.ok_or_else(|| {
        AppError::conflict("booking was modified concurrently, please retry")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": booking
    })))
}

/// Marks the gateway outcome on the booking. Safe to call twice with the
/// same completed outcome; the duplicate is a no-op.
async fn apply_payment_outcome(
    pg: &PgPool,
    booking: &Booking,
    outcome: PaymentStatus,
    amount: Option<f64>,
    now: OffsetDateTime,
) -> Result<Booking, AppError> {

    if booking.is_duplicate_completion(outcome) {
        return load_booking(pg, booking.booking_id).await;
    }

    let updated = match outcome {
        PaymentStatus::Completed => {
            let next_status = if booking.status == BookingStatus::Pending {
                BookingStatus::Confirmed
            } else {
                booking.status
            };

            sqlx::query_as::<_, Booking>(
                r#"
                UPDATE bookings
                SET payment_status = $1, paid_at = $2, amount_paid = $3,
                    status = $4, version = version + 1
                WHERE booking_id = $5 AND version = $6
                RETURNING *
                "#,
            )
            .bind(PaymentStatus::Completed)
            .bind(now)
            .bind(amount.unwrap_or(booking.total_price))
            .bind(next_status)
            .bind(booking.booking_id)
            .bind(booking.version)
            .fetch_optional(pg)
            .await
            .map_err(AppError::from)?
        }
        PaymentStatus::Failed => sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET payment_status = $1, version = version + 1
            WHERE booking_id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(PaymentStatus::Failed)
        .bind(booking.booking_id)
        .bind(booking.version)
        .fetch_optional(pg)
        .await
        .map_err(AppError::from)?,
        _ => {
            return Err(AppError::validation(
                "payment status must be completed or failed",
            ));
        }
    };

    updated.ok_or_else(|| AppError::conflict("booking was modified concurrently, please retry"))
}

pub async fn complete_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CompletePaymentReq>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = load_booking(&state.pg, booking_id).await?;

    if claims.id != booking.guest_id {
        return Err(AppError::forbidden("only the guest can complete payment"));
    }

    //replay defense: the supplied intent must be the one we created
    if booking.payment_intent_id.as_deref() != Some(payload.payment_intent_id.as_str()) {
        return Err(AppError::forbidden(
            "payment intent does not match this booking",
        ));
    }

    let now = OffsetDateTime::now_utc();
    let booking =
        apply_payment_outcome(&state.pg, &booking, payload.payment_status, None, now).await?;

    Ok(Json(json!({
        "success": true,
        "data": booking
    })))
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<PaymentWebhookEvent>,
) -> Result<Json<Value>, AppError> {

    let booking = load_booking(&state.pg, event.booking_id).await?;

    if booking.payment_intent_id.as_deref() != Some(event.payment_intent_id.as_str()) {
        warn!(
            "webhook intent mismatch for booking {}: {}",
            event.booking_id, event.payment_intent_id
        );
        return Err(AppError::forbidden(
            "payment intent does not match this booking",
        ));
    }

    match event.status {
        PaymentStatus::Completed | PaymentStatus::Failed => {
            let now = OffsetDateTime::now_utc();
            let booking =
                apply_payment_outcome(&state.pg, &booking, event.status, event.amount, now)
                    .await?;

            info!(
                "webhook {} applied to booking {}",
                event.event_type, booking.booking_id
            );

            Ok(Json(json!({
                "success": true,
                "data": {
                    "received": true,
                    "booking_id": booking.booking_id,
                    "status": booking.status
                }
            })))
        }
        //anything else is the gateway's business, acknowledge and move on
        _ => Ok(Json(json!({
            "success": true,
            "data": {
                "received": true,
                "booking_id": booking.booking_id
            }
        }))),
    }
}
