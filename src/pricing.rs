use time::OffsetDateTime;

use serde::Serialize;

use crate::models::listing::Listing;
use crate::utils::errorhandler::AppError;

pub const SERVICE_FEE_RATE: f64 = 0.14;
pub const TAX_RATE: f64 = 0.08;

const MS_PER_NIGHT: i128 = 86_400_000;

/// Deterministic pricing snapshot for a stay. Computed once at creation
/// and written to the booking row verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quote {
    pub base_price: f64,
    pub nights: i64,
    pub subtotal: f64,
    pub cleaning_fee: f64,
    pub service_fee: f64,
    pub taxes: f64,
    pub weekly_discount: f64,
    pub monthly_discount: f64,
    pub total: f64,
}

impl Quote {
    pub fn discount(&self) -> f64 {
        self.weekly_discount + self.monthly_discount
    }

    /// Amount handed to the payment gateway, in integer cents.
    pub fn total_minor_units(&self) -> i64 {
        (self.total * 100.0).round() as i64
    }
}

pub fn validate_stay_window(
    check_in: OffsetDateTime,
    check_out: OffsetDateTime,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    if check_in < now {
        return Err(AppError::validation("check-in date cannot be in the past"));
    }
    if check_out <= check_in {
        return Err(AppError::validation("check-out must be after check-in"));
    }
    Ok(())
}

/// Partial nights round up: a 3.5-day window is billed as 4 nights.
pub fn nights_between(check_in: OffsetDateTime, check_out: OffsetDateTime) -> i64 {
    let ms = (check_out - check_in).whole_milliseconds();
    ((ms + MS_PER_NIGHT - 1) / MS_PER_NIGHT) as i64
}

pub fn quote(listing: &Listing, check_in: OffsetDateTime, check_out: OffsetDateTime) -> Quote {
    let nights = nights_between(check_in, check_out);
    let subtotal = listing.base_price * nights as f64;
    let cleaning_fee = listing.cleaning_fee;
    let service_fee = subtotal * SERVICE_FEE_RATE;
    let taxes = subtotal * TAX_RATE;

    //monthly wins over weekly; never both
    let mut weekly_discount = 0.0;
    let mut monthly_discount = 0.0;
    if nights >= 28 && listing.monthly_discount_pct > 0.0 {
        monthly_discount = subtotal * (listing.monthly_discount_pct / 100.0);
    } else if nights >= 7 && listing.weekly_discount_pct > 0.0 {
        weekly_discount = subtotal * (listing.weekly_discount_pct / 100.0);
    }

    let total = subtotal + cleaning_fee + service_fee + taxes - weekly_discount - monthly_discount;

    Quote {
        base_price: listing.base_price,
        nights,
        subtotal,
        cleaning_fee,
        service_fee,
        taxes,
        weekly_discount,
        monthly_discount,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::{CancellationPolicy, Currency, ListingStatus};
    use sqlx::types::Json;
    use time::macros::datetime;
    use uuid::Uuid;

    fn assert_money_eq(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn listing(base_price: f64, cleaning_fee: f64, weekly_pct: f64, monthly_pct: f64) -> Listing {
        Listing {
            listing_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: "Seaside cottage".into(),
            description: None,
            location: "Lisbon".into(),
            status: ListingStatus::Active,
            base_price,
            currency: Currency::USD,
            cleaning_fee,
            security_deposit: 0.0,
            weekly_discount_pct: weekly_pct,
            monthly_discount_pct: monthly_pct,
            extra_fees: Json(vec![]),
            max_guests: 4,
            cancellation_policy: CancellationPolicy::Moderate,
            created_at: datetime!(2025-01-01 00:00 UTC),
        }
    }

    #[test]
    fn nights_round_up_to_whole_nights() {
        let check_in = datetime!(2025-07-01 15:00 UTC);
        assert_eq!(nights_between(check_in, datetime!(2025-07-02 15:00 UTC)), 1);
        //an extra hour spills into another billable night
        assert_eq!(nights_between(check_in, datetime!(2025-07-02 16:00 UTC)), 2);
        assert_eq!(nights_between(check_in, datetime!(2025-07-11 15:00 UTC)), 10);
    }

    #[test]
    fn ten_night_stay_with_weekly_discount() {
        //1000/night for 10 nights, 10% weekly discount, 500 cleaning fee
        let l = listing(1000.0, 500.0, 10.0, 0.0);
        let q = quote(
            &l,
            datetime!(2025-07-01 14:00 UTC),
            datetime!(2025-07-11 14:00 UTC),
        );
        assert_eq!(q.nights, 10);
        assert_money_eq(q.subtotal, 10_000.0);
        assert_money_eq(q.weekly_discount, 1_000.0);
        assert_money_eq(q.monthly_discount, 0.0);
        assert_money_eq(q.service_fee, 1_400.0);
        assert_money_eq(q.taxes, 800.0);
        assert_money_eq(q.total, 11_700.0);
        assert_eq!(q.total_minor_units(), 1_170_000);
    }

    #[test]
    fn monthly_discount_excludes_weekly() {
        //30 nights with both discounts configured: only the monthly applies
        let l = listing(100.0, 0.0, 10.0, 20.0);
        let q = quote(
            &l,
            datetime!(2025-07-01 14:00 UTC),
            datetime!(2025-07-31 14:00 UTC),
        );
        assert_eq!(q.nights, 30);
        assert_money_eq(q.weekly_discount, 0.0);
        assert_money_eq(q.monthly_discount, 600.0);
        assert_money_eq(q.discount(), 600.0);
    }

    #[test]
    fn weekly_discount_needs_seven_nights() {
        let l = listing(100.0, 0.0, 10.0, 0.0);
        let q = quote(
            &l,
            datetime!(2025-07-01 14:00 UTC),
            datetime!(2025-07-07 14:00 UTC),
        );
        assert_eq!(q.nights, 6);
        assert_money_eq(q.weekly_discount, 0.0);
        let q = quote(
            &l,
            datetime!(2025-07-01 14:00 UTC),
            datetime!(2025-07-08 14:00 UTC),
        );
        assert_eq!(q.nights, 7);
        assert_money_eq(q.weekly_discount, 70.0);
    }

    #[test]
    fn zero_discount_percentages_apply_nothing() {
        let l = listing(100.0, 0.0, 0.0, 0.0);
        let q = quote(
            &l,
            datetime!(2025-07-01 14:00 UTC),
            datetime!(2025-08-15 14:00 UTC),
        );
        assert_money_eq(q.discount(), 0.0);
        assert_money_eq(q.total, q.subtotal + q.service_fee + q.taxes);
    }

    #[test]
    fn minor_units_round_half_up() {
        let l = listing(0.333, 0.0, 0.0, 0.0);
        let q = quote(
            &l,
            datetime!(2025-07-01 14:00 UTC),
            datetime!(2025-07-02 14:00 UTC),
        );
        //0.333 * 1.22 = 0.40626 -> 41 cents
        assert_eq!(q.total_minor_units(), 41);
    }

    #[test]
    fn stay_window_rejects_past_check_in() {
        let now = datetime!(2025-07-01 12:00 UTC);
        assert!(validate_stay_window(
            datetime!(2025-06-30 12:00 UTC),
            datetime!(2025-07-05 12:00 UTC),
            now
        )
        .is_err());
    }

    #[test]
    fn stay_window_rejects_inverted_or_empty_ranges() {
        let now = datetime!(2025-07-01 12:00 UTC);
        let check_in = datetime!(2025-07-10 12:00 UTC);
        assert!(validate_stay_window(check_in, check_in, now).is_err());
        assert!(validate_stay_window(check_in, datetime!(2025-07-09 12:00 UTC), now).is_err());
        assert!(validate_stay_window(check_in, datetime!(2025-07-12 12:00 UTC), now).is_ok());
    }
}
