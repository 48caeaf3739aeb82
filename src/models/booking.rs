use serde::{Deserialize, Serialize};

use sqlx::{Type, prelude::FromRow};
use time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::listing::{CancellationPolicy, Currency};

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "booking_status")]
pub enum BookingStatus {
    #[sqlx(rename = "pending")]
    #[serde(rename = "pending")]
    Pending,
    #[sqlx(rename = "confirmed")]
    #[serde(rename = "confirmed")]
    Confirmed,
    #[sqlx(rename = "cancelled_by_guest")]
    #[serde(rename = "cancelled_by_guest")]
    CancelledByGuest,
    #[sqlx(rename = "cancelled_by_host")]
    #[serde(rename = "cancelled_by_host")]
    CancelledByHost,
    #[sqlx(rename = "completed")]
    #[serde(rename = "completed")]
    Completed,
    #[sqlx(rename = "no_show")]
    #[serde(rename = "no_show")]
    NoShow,
    #[sqlx(rename = "in_progress")]
    #[serde(rename = "in_progress")]
    InProgress,
}

impl BookingStatus {
    pub fn is_cancelled(self) -> bool {
        matches!(
            self,
            BookingStatus::CancelledByGuest | BookingStatus::CancelledByHost
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::NoShow
        ) || self.is_cancelled()
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, CancelledByGuest)
                | (Pending, CancelledByHost)
                | (Confirmed, CancelledByGuest)
                | (Confirmed, CancelledByHost)
                | (Confirmed, InProgress)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
                | (InProgress, Completed)
        )
    }
}

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "payment_status")]
pub enum PaymentStatus {
    #[sqlx(rename = "pending")]
    #[serde(rename = "pending")]
    Pending,
    #[sqlx(rename = "processing")]
    #[serde(rename = "processing")]
    Processing,
    #[sqlx(rename = "completed")]
    #[serde(rename = "completed")]
    Completed,
    #[sqlx(rename = "failed")]
    #[serde(rename = "failed")]
    Failed,
    #[sqlx(rename = "refunded")]
    #[serde(rename = "refunded")]
    Refunded,
    #[sqlx(rename = "partially_refunded")]
    #[serde(rename = "partially_refunded")]
    PartiallyRefunded,
}

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "payment_method")]
pub enum PaymentMethod {
    #[sqlx(rename = "credit_card")]
    #[serde(rename = "credit_card")]
    CreditCard,
    #[sqlx(rename = "cash")]
    #[serde(rename = "cash")]
    Cash,
    #[sqlx(rename = "upi")]
    #[serde(rename = "upi")]
    Upi,
}

pub const GUEST_CANCEL_REASON: &str = "change_of_plans";
pub const HOST_CANCEL_REASON: &str = "host_cancelled";

/// Half-open `[start, end)` windows; back-to-back stays do not overlap.
pub fn windows_overlap(
    a_start: OffsetDateTime,
    a_end: OffsetDateTime,
    b_start: OffsetDateTime,
    b_end: OffsetDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct GuestCounts {
    #[validate(range(min = 1))]
    pub adults: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub children: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub infants: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub pets: i32,
}

impl GuestCounts {
    //pets do not count against listing capacity
    pub fn occupancy(&self) -> i32 {
        self.adults + self.children + self.infants
    }
}

#[derive(Serialize, Deserialize, Debug, FromRow)]
pub struct Booking {
    pub booking_id: Uuid,
    pub confirmation_code: String,
    pub listing_id: Uuid,
    pub guest_id: Uuid,
    //snapshot of the listing's host at creation time, never re-derived
    pub host_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub check_out: OffsetDateTime,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub pets: i32,
    pub base_price: f64,
    pub nights: i32,
    pub subtotal: f64,
    pub cleaning_fee: f64,
    pub service_fee: f64,
    pub taxes: f64,
    pub weekly_discount: f64,
    pub monthly_discount: f64,
    pub total_price: f64,
    pub currency: Currency,
    pub special_requests: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    pub amount_paid: Option<f64>,
    pub refund_amount: Option<f64>,
    pub status: BookingStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub custom_reason: Option<String>,
    pub version: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Booking {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.guest_id == user_id || self.host_id == user_id
    }

    /// Never for stays already underway or settled, and never inside the
    /// 24-hour window before check-in, regardless of policy.
    pub fn can_be_cancelled(&self, now: OffsetDateTime) -> bool {
        if self.status.is_terminal() || self.status == BookingStatus::InProgress {
            return false;
        }
        self.check_in - now > Duration::hours(24)
    }

    /// Refund owed under the listing's cancellation policy for a
    /// cancellation happening at `now`. Tier thresholds are inclusive:
    /// a strict-policy cancellation at exactly 168h gets a full refund.
    pub fn compute_refund(&self, policy: CancellationPolicy, now: OffsetDateTime) -> f64 {
        let hours_left = (self.check_in - now).whole_seconds() as f64 / 3600.0;
        match policy {
            CancellationPolicy::Flexible => {
                if hours_left >= 24.0 {
                    self.total_price
                } else {
                    self.total_price * 0.5
                }
            }
            CancellationPolicy::Moderate => {
                if hours_left >= 120.0 {
                    self.total_price
                } else {
                    self.total_price * 0.5
                }
            }
            CancellationPolicy::Strict => {
                if hours_left >= 168.0 {
                    self.total_price
                } else {
                    0.0
                }
            }
            //the default tier: policies with no dedicated rule
            CancellationPolicy::SuperStrict30 | CancellationPolicy::SuperStrict60 => {
                if hours_left >= 48.0 {
                    self.total_price * 0.5
                } else {
                    0.0
                }
            }
        }
    }

    /// Gateway callbacks can be delivered more than once; a completed
    /// payment reported completed again must not be re-applied.
    pub fn is_duplicate_completion(&self, incoming: PaymentStatus) -> bool {
        self.payment_status == PaymentStatus::Completed && incoming == PaymentStatus::Completed
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateBookingReq {
    pub listing_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub check_out: OffsetDateTime,
    #[validate(nested)]
    pub guests: GuestCounts,
    pub special_requests: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_intent_id: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct PaymentIntentReq {
    pub listing_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub check_out: OffsetDateTime,
    #[validate(nested)]
    pub guests: GuestCounts,
    pub payment_method_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusReq {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CompletePaymentReq {
    pub payment_intent_id: String,
    pub payment_status: PaymentStatus,
}

#[derive(Deserialize)]
pub struct PaymentWebhookEvent {
    pub event_type: String,
    pub booking_id: Uuid,
    pub payment_intent_id: String,
    pub amount: Option<f64>,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Guest,
    Host,
}

#[derive(Deserialize)]
pub struct BookingQueryParams {
    pub role: Option<PartyRole>,
    pub status: Option<BookingStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct BookedWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub check_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub check_out: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn booking(status: BookingStatus, check_in: OffsetDateTime) -> Booking {
        Booking {
            booking_id: Uuid::new_v4(),
            confirmation_code: "AB12CD34".into(),
            listing_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            check_in,
            check_out: check_in + Duration::days(3),
            adults: 2,
            children: 0,
            infants: 0,
            pets: 0,
            base_price: 100.0,
            nights: 3,
            subtotal: 300.0,
            cleaning_fee: 0.0,
            service_fee: 42.0,
            taxes: 24.0,
            weekly_discount: 0.0,
            monthly_discount: 0.0,
            total_price: 366.0,
            currency: Currency::USD,
            special_requests: None,
            payment_method: Some(PaymentMethod::CreditCard),
            payment_status: PaymentStatus::Completed,
            payment_intent_id: Some("pi_test".into()),
            paid_at: None,
            amount_paid: Some(366.0),
            refund_amount: None,
            status,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            custom_reason: None,
            version: 0,
            created_at: datetime!(2025-01-01 00:00 UTC),
        }
    }

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    #[test]
    fn pending_can_be_confirmed_or_cancelled() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(CancelledByGuest));
        assert!(Pending.can_transition_to(CancelledByHost));
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(NoShow));
    }

    #[test]
    fn confirmed_flows_forward_or_cancels() {
        use BookingStatus::*;
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(Confirmed.can_transition_to(CancelledByGuest));
        assert!(Confirmed.can_transition_to(CancelledByHost));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        use BookingStatus::*;
        for terminal in [Completed, NoShow, CancelledByGuest, CancelledByHost] {
            for next in [
                Pending,
                Confirmed,
                CancelledByGuest,
                CancelledByHost,
                Completed,
                NoShow,
                InProgress,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn in_progress_only_completes() {
        use BookingStatus::*;
        assert!(InProgress.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(CancelledByGuest));
        assert!(!InProgress.can_transition_to(CancelledByHost));
        assert!(!InProgress.can_transition_to(NoShow));
    }

    #[test]
    fn cancellation_rejected_within_24_hours_of_check_in() {
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(23));
        assert!(!b.can_be_cancelled(NOW));
        //exactly 24h away is still too late
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(24));
        assert!(!b.can_be_cancelled(NOW));
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(25));
        assert!(b.can_be_cancelled(NOW));
    }

    #[test]
    fn cancellation_rejected_for_settled_or_running_stays() {
        use BookingStatus::*;
        let far = NOW + Duration::days(30);
        for status in [InProgress, Completed, NoShow, CancelledByGuest, CancelledByHost] {
            assert!(!booking(status, far).can_be_cancelled(NOW), "{status:?}");
        }
        assert!(booking(Pending, far).can_be_cancelled(NOW));
        assert!(booking(Confirmed, far).can_be_cancelled(NOW));
    }

    #[test]
    fn flexible_refunds_in_full_above_a_day_out() {
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(30));
        assert_eq!(b.compute_refund(CancellationPolicy::Flexible, NOW), 366.0);
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(10));
        assert_eq!(b.compute_refund(CancellationPolicy::Flexible, NOW), 183.0);
    }

    #[test]
    fn moderate_refund_steps_at_five_days() {
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(121));
        assert_eq!(b.compute_refund(CancellationPolicy::Moderate, NOW), 366.0);
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(119));
        assert_eq!(b.compute_refund(CancellationPolicy::Moderate, NOW), 183.0);
    }

    #[test]
    fn strict_refund_boundary_is_exactly_168_hours() {
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(168));
        assert_eq!(b.compute_refund(CancellationPolicy::Strict, NOW), 366.0);
        let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(167));
        assert_eq!(b.compute_refund(CancellationPolicy::Strict, NOW), 0.0);
    }

    #[test]
    fn super_strict_policies_use_the_default_tier() {
        for policy in [
            CancellationPolicy::SuperStrict30,
            CancellationPolicy::SuperStrict60,
        ] {
            let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(49));
            assert_eq!(b.compute_refund(policy, NOW), 183.0);
            let b = booking(BookingStatus::Confirmed, NOW + Duration::hours(47));
            assert_eq!(b.compute_refund(policy, NOW), 0.0);
        }
    }

    #[test]
    fn occupancy_excludes_pets() {
        let guests = GuestCounts {
            adults: 3,
            children: 2,
            infants: 1,
            pets: 2,
        };
        assert_eq!(guests.occupancy(), 6);
        let guests = GuestCounts {
            adults: 3,
            children: 1,
            infants: 1,
            pets: 0,
        };
        assert_eq!(guests.occupancy(), 5);
    }

    #[test]
    fn overlap_is_half_open() {
        let a = datetime!(2025-07-01 00:00 UTC);
        let b = datetime!(2025-07-05 00:00 UTC);
        let c = datetime!(2025-07-03 00:00 UTC);
        let d = datetime!(2025-07-08 00:00 UTC);
        assert!(windows_overlap(a, b, c, d));
        //back-to-back stays share a boundary instant but not a night
        assert!(!windows_overlap(a, b, b, d));
        assert!(!windows_overlap(c, d, a, c));
        //containment counts as overlap
        assert!(windows_overlap(a, d, c, b));
    }

    #[test]
    fn duplicate_completion_is_detected() {
        let b = booking(BookingStatus::Confirmed, NOW + Duration::days(5));
        assert!(b.is_duplicate_completion(PaymentStatus::Completed));
        assert!(!b.is_duplicate_completion(PaymentStatus::Failed));
        let mut b = booking(BookingStatus::Pending, NOW + Duration::days(5));
        b.payment_status = PaymentStatus::Pending;
        assert!(!b.is_duplicate_completion(PaymentStatus::Completed));
    }
}
