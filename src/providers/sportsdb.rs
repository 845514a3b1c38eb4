//! TheSportsDB client for upcoming league fixtures

use super::{DataProvider, SportsEvent, UpcomingEvents};
use crate::error::TipsterError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json";
/// Free test key.
pub const DEFAULT_API_KEY: &str = "3";
/// English Premier League.
pub const DEFAULT_LEAGUE_ID: &str = "4328";

#[derive(Clone)]
pub struct SportsDbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SportsDbClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn events_url(&self) -> String {
        format!("{}/{}/eventsnextleague.php", self.base_url, self.api_key)
    }
}

/// `events` is `null` when the league has nothing scheduled.
#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Option<Vec<SportsEvent>>,
}

#[async_trait::async_trait]
impl DataProvider for SportsDbClient {
    async fn fetch_upcoming_events(&self, league_id: &str) -> crate::Result<UpcomingEvents> {
        let url = self.events_url();
        debug!(league_id, "Fetching upcoming events");

        let response = self
            .client
            .get(&url)
            .query(&[("id", league_id)])
            .send()
            .await
            .map_err(|e| {
                error!("Sports data request failed: {}", e);
                TipsterError::Transport(format!("Sports data request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TipsterError::Transport(format!(
                "Sports data API returned {} for league {}",
                status, league_id
            )));
        }

        let body: EventsResponse = response.json().await.map_err(|e| {
            TipsterError::InvalidResponse(format!("Invalid sports data payload: {}", e))
        })?;

        Ok(UpcomingEvents {
            league_id: league_id.to_string(),
            events: body.events.unwrap_or_default(),
        })
    }
}
