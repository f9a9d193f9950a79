use std::sync::Arc;
use std::time::Instant;

use crate::application::gateway::SheetsGateway;

use super::auth::BearerAuth;
use super::rate_limit::RateLimiters;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<SheetsGateway>,
    pub auth: Arc<BearerAuth>,
    pub rate_limiters: Arc<RateLimiters>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(gateway: Arc<SheetsGateway>, auth: BearerAuth, rate_limiters: RateLimiters) -> Self {
        Self {
            gateway,
            auth: Arc::new(auth),
            rate_limiters: Arc::new(rate_limiters),
            started_at: Instant::now(),
        }
    }
}
