use axum::{
    Router,
    routing::{get, post, put},
};

use crate::route::{auth::{login_user, register_user}, bookings::{complete_payment, create_booking, create_payment_intent, get_booking_by_id, get_bookings, payment_webhook, update_booking_status}, listings::{create_listing, get_listing_booked_windows, get_listing_by_id, get_listings}, messages::{get_messages, mark_messages_read, send_message, stream_messages}};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
    //auth
    .route("/auth/register", post(register_user))                       //create a guest or host account
    .route("/auth/login", post(login_user))                             //login for guests and hosts
    //listings
    .route("/listings", post(create_listing))                           //publish a listing, hosts only
    .route("/listings", get(get_listings))                              //browse listings with filters
    .route("/listings/{id}", get(get_listing_by_id))                    //get listing by id
    .route("/listings/{id}/bookings", get(get_listing_booked_windows))  //booked windows for availability calendars
    //bookings
    .route("/bookings/payment-intent", post(create_payment_intent))     //quote a stay and open a payment intent
    .route("/bookings", post(create_booking))                           //book a stay directly
    .route("/bookings", get(get_bookings))                              //list your bookings as guest or host
    .route("/bookings/{id}", get(get_booking_by_id))                    //get booking by id, parties only
    .route("/bookings/{id}/status", put(update_booking_status))         //confirm, cancel, progress a stay
    .route("/bookings/{id}/complete-payment", put(complete_payment))    //mark gateway outcome, guest only
    //messages
    .route("/bookings/{id}/messages", post(send_message))              //message the other party
    .route("/bookings/{id}/messages", get(get_messages))               //conversation history
    .route("/bookings/{id}/messages/read", put(mark_messages_read))    //mark the other party's messages read
    .route("/bookings/{id}/messages/stream", get(stream_messages))     //live message stream
    //webhooks
    .route("/webhooks/payment", post(payment_webhook))                 //gateway callback, idempotent
    .with_state(state)
}
