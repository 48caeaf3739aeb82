use serde::{Deserialize, Serialize};

use sqlx::{Type, prelude::FromRow, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "listing_status")]
pub enum ListingStatus {
    #[sqlx(rename = "active")]
    #[serde(rename = "active")]
    Active,
    #[sqlx(rename = "inactive")]
    #[serde(rename = "inactive")]
    Inactive,
}

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "currency")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    INR,
}

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "cancellation_policy")]
pub enum CancellationPolicy {
    #[sqlx(rename = "flexible")]
    #[serde(rename = "flexible")]
    Flexible,
    #[sqlx(rename = "moderate")]
    #[serde(rename = "moderate")]
    Moderate,
    #[sqlx(rename = "strict")]
    #[serde(rename = "strict")]
    Strict,
    #[sqlx(rename = "super_strict_30")]
    #[serde(rename = "super_strict_30")]
    SuperStrict30,
    #[sqlx(rename = "super_strict_60")]
    #[serde(rename = "super_strict_60")]
    SuperStrict60,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeBasis {
    PerStay,
    PerNight,
    PerPerson,
}

/// Named fee on the listing's fee schedule. Carried on the booking quote
/// for display; the total-price formula does not include these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraFee {
    pub label: String,
    pub amount: f64,
    pub basis: FeeBasis,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Serialize, Deserialize, Debug, FromRow)]
pub struct Listing {
    pub listing_id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub status: ListingStatus,
    pub base_price: f64,
    pub currency: Currency,
    pub cleaning_fee: f64,
    pub security_deposit: f64,
    pub weekly_discount_pct: f64,
    pub monthly_discount_pct: f64,
    pub extra_fees: Json<Vec<ExtraFee>>,
    pub max_guests: i32,
    pub cancellation_policy: CancellationPolicy,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Deserialize, Validate)]
pub struct CreateListingReq {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub location: String,
    #[validate(range(min = 0.01))]
    pub base_price: f64,
    pub currency: Option<Currency>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub cleaning_fee: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub security_deposit: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub weekly_discount_pct: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub monthly_discount_pct: f64,
    #[serde(default)]
    pub extra_fees: Vec<ExtraFee>,
    #[validate(range(min = 1))]
    pub max_guests: i32,
    pub cancellation_policy: Option<CancellationPolicy>,
}

#[derive(Deserialize)]
pub struct ListingQueryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub title: Option<String>,
    pub location: Option<String>,
}
