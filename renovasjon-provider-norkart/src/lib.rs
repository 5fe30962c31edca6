//! Calendar port for the Norkart “Min Renovasjon” web API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, error};

use renovasjon_core::{
    model::Address,
    ports::{CalendarPort, Payload},
};

/// Production endpoint of the API.
pub const BASE_URL: &str = "https://komteksky.norkart.no/komtek.renovasjonwebapi/api";

// Public key shipped with the official app; the API rejects requests without it.
const APP_KEY: &str = "AE13DEEC-804F-4615-A74E-B4FAC11F0A30";

const HEADER_COUNTY: &str = "Kommunenr";
const HEADER_APP_KEY: &str = "RenovasjonAppKey";

/// Schedule and fraction lookups against the Norkart API.
pub struct NorkartCalendarPort {
    client: Client,
    base_url: String,
}

impl NorkartCalendarPort {
    /// Create a port for the production API bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    /// Create a port talking to another deployment of the API.
    #[must_use]
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    fn get(&self, url: String, address: &Address) -> RequestBuilder {
        self.client
            .get(url)
            .header(HEADER_COUNTY, address.county_id.as_str())
            .header(HEADER_APP_KEY, APP_KEY)
    }
}

#[async_trait]
impl CalendarPort for NorkartCalendarPort {
    async fn schedule(&self, address: &Address) -> Option<String> {
        // street_name is already percent-encoded, the other parts are encoded here
        let url = format!(
            "{}/tommekalender?gatenavn={}&gatekode={}&husnr={}",
            self.base_url,
            address.street_name,
            urlencoding::encode(&address.street_code),
            urlencoding::encode(&address.house_number),
        );

        fetch_text(self.get(url, address), Payload::Schedule).await
    }

    async fn fractions(&self, address: &Address) -> Option<String> {
        let url = format!("{}/fraksjoner", self.base_url);

        fetch_text(self.get(url, address), Payload::Fractions).await
    }
}

// Failed requests are logged and reported as a missing payload.
async fn fetch_text(req: RequestBuilder, payload: Payload) -> Option<String> {
    let response = match req.send().await {
        Ok(response) => response,
        Err(err) => {
            error!(%payload, error = %err, "request failed");
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        error!(%payload, %status, "API returned an error status");
        return None;
    }

    match response.text().await {
        Ok(body) => {
            debug!(%payload, bytes = body.len(), "received payload");
            Some(body)
        }
        Err(err) => {
            error!(%payload, error = %err, "failed to read response body");
            None
        }
    }
}
