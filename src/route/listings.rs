use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{Value, json};
use sqlx::QueryBuilder;
use sqlx::types::Json as Jsonb;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        booking::BookedWindow,
        listing::{CancellationPolicy, CreateListingReq, Currency, Listing, ListingQueryParams},
    },
    state::AppState,
    utils::{
        errorhandler::AppError,
        jwt::{AccessRole, verify_auth_token},
    },
};

pub async fn create_listing(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateListingReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    //only hosts can publish listings
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    if claims.role != AccessRole::Host {
        return Err(AppError::forbidden("only hosts have access"));
    }

    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let listing = sqlx::query_as::<_, Listing>(
        r#"
        INSERT INTO listings
            (host_id, title, description, location, base_price, currency,
             cleaning_fee, security_deposit, weekly_discount_pct,
             monthly_discount_pct, extra_fees, max_guests, cancellation_policy)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(claims.id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.location)
    .bind(payload.base_price)
    .bind(payload.currency.unwrap_or(Currency::USD))
    .bind(payload.cleaning_fee)
    .bind(payload.security_deposit)
    .bind(payload.weekly_discount_pct)
    .bind(payload.monthly_discount_pct)
    .bind(Jsonb(&payload.extra_fees))
    .bind(payload.max_guests)
    .bind(
        payload
            .cancellation_policy
            .unwrap_or(CancellationPolicy::Moderate),
    )
    .fetch_one(&state.pg)
    .await
    .map_err(AppError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": listing
        })),
    ))
}

pub async fn get_listing_by_id(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {

    let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_optional(&state.pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("listing not found"))?;

    Ok(Json(json!({
        "success": true,
        "data": listing
    })))
}

pub async fn get_listings(
    State(state): State<AppState>,
    Query(params): Query<ListingQueryParams>,
) -> Result<Json<Value>, AppError> {

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut query_builder = QueryBuilder::new("SELECT * FROM listings WHERE status = 'active'");

    //title filter
    if let Some(title) = &params.title {
        query_builder.push(" AND title ILIKE ");
        query_builder.push_bind(format!("%{}%", title));
    };

    if let Some(location) = &params.location {
        query_builder.push(" AND location ILIKE ");
        query_builder.push_bind(format!("%{}%", location));
    };

    query_builder.push(" ORDER BY created_at DESC ");
    query_builder.push(" LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let listings = query_builder
        .build_query_as::<Listing>()
        .fetch_all(&state.pg)
        .await
        .map_err(AppError::from)?;

    let mut count_builder =
        QueryBuilder::new("SELECT COUNT(*) FROM listings WHERE status = 'active'");
    if let Some(title) = &params.title {
        count_builder.push(" AND title ILIKE ");
        count_builder.push_bind(format!("%{}%", title));
    };
    if let Some(location) = &params.location {
        count_builder.push(" AND location ILIKE ");
        count_builder.push_bind(format!("%{}%", location));
    };

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
            "items": listings
        }
    });
    Ok(Json(response))
}

/// Booked windows for a listing, for availability calendars. Only
/// active holds (pending or confirmed) block dates.
pub async fn get_listing_booked_windows(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {

    //404 for unknown listings rather than an empty calendar
    sqlx::query_scalar::<_, Uuid>("SELECT listing_id FROM listings WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_optional(&state.pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("listing not found"))?;

    let windows = sqlx::query_as::<_, BookedWindow>(
        r#"
        SELECT check_in, check_out FROM bookings
        WHERE listing_id = $1
          AND status IN ('pending', 'confirmed')
          AND check_out > now()
        ORDER BY check_in
        "#,
    )
    .bind(listing_id)
    .fetch_all(&state.pg)
    .await
    .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "data": windows
    })))
}
