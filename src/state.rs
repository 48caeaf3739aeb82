use sqlx::PgPool;

use crate::payments::PaymentClient;
use crate::relay::MessageRelay;

#[derive(Clone)]
pub struct AppState {
    pub pg: PgPool,
    pub payments: PaymentClient,
    pub relay: MessageRelay,
}

impl AppState {
    pub fn new(pg: PgPool) -> Self {
        AppState {
            pg,
            payments: PaymentClient::new(),
            relay: MessageRelay::new(),
        }
    }
}
