//! # Lock Contention API Client
//!
//! Typed access to the dashboard's REST surface. The poll channel uses
//! `hot_accounts` and `dashboard_stats`; the per-account calls serve detail
//! views and tooling.

use crate::error::FetchError;
use crate::model::{
    AccountStats, DashboardStats, HotAccountRecord, LiveFeeEstimate, PriorityFeeEstimate, PriorityFeeRequest,
};
use crate::retrieve::ky_http::{ApiClient, ApiClientOptions};

/// Default window for per-account statistics, in hours.
pub const DEFAULT_ACCOUNT_STATS_WINDOW_HOURS: u32 = 24;

#[derive(Clone)]
pub struct LockApi {
    client: ApiClient,
}

impl LockApi {
    pub fn new(base_url: &str, options: ApiClientOptions) -> Result<Self, FetchError> {
        Ok(Self {
            client: ApiClient::new(base_url, options)?,
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// `GET /api/hot-accounts?limit=&window=` (window in minutes).
    pub async fn hot_accounts(&self, limit: u32, window_minutes: u32) -> Result<Vec<HotAccountRecord>, FetchError> {
        let url = self.client.endpoint(
            &["api", "hot-accounts"],
            &[("limit", limit.to_string()), ("window", window_minutes.to_string())],
        )?;
        self.client.get_json(url).await
    }

    /// `GET /api/stats?window=` (window in minutes).
    pub async fn dashboard_stats(&self, window_minutes: u32) -> Result<DashboardStats, FetchError> {
        let url = self
            .client
            .endpoint(&["api", "stats"], &[("window", window_minutes.to_string())])?;
        self.client.get_json(url).await
    }

    /// `GET /api/accounts/{pubkey}/stats?window=` (window in hours).
    pub async fn account_stats(&self, pubkey: &str, window_hours: u32) -> Result<AccountStats, FetchError> {
        let url = self.client.endpoint(
            &["api", "accounts", pubkey, "stats"],
            &[("window", window_hours.to_string())],
        )?;
        self.client.get_json(url).await
    }

    /// `GET /api/accounts/{pubkey}/fee-now`
    pub async fn live_fee(&self, pubkey: &str) -> Result<LiveFeeEstimate, FetchError> {
        let url = self.client.endpoint(&["api", "accounts", pubkey, "fee-now"], &[])?;
        self.client.get_json(url).await
    }

    /// `POST /api/priority-fees/estimate`. The server rejects an empty
    /// account list, so it is refused here without a round trip.
    pub async fn estimate_priority_fee(&self, accounts: &[String]) -> Result<PriorityFeeEstimate, FetchError> {
        if accounts.is_empty() {
            return Err(FetchError::InvalidRequest("at least one account is required".to_string()));
        }
        let url = self.client.endpoint(&["api", "priority-fees", "estimate"], &[])?;
        let body = PriorityFeeRequest {
            accounts: accounts.to_vec(),
        };
        self.client.post_json(url, &body).await
    }
}
