// Location resolver - geolocates hop addresses via an ip-api style service
//
// The service is queried as GET <base>/<ip> and answers with
// {"status": "success", "lat": .., "lon": .., "countryCode": "..", "city": ".."}
// or {"status": "fail", "message": "..."}.

use reqwest::Client;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

use super::{HopLocation, Lookup, UNKNOWN_CITY};
use crate::error::LookupFailure;

pub const DEFAULT_BASE_URL: &str = "http://ip-api.com/json";

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    client: Client,
    base_url: String,
}

impl LocationResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("geo-traceroute/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        LocationResolver { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Geolocate one address with a single bounded request
    pub async fn resolve(&self, ip: Ipv4Addr) -> Lookup {
        match self.fetch(ip).await {
            Ok(location) => Lookup::Resolved(location),
            Err(failure) => {
                tracing::debug!("Hop {} unresolved: {}", ip, failure);
                Lookup::Unresolved(failure)
            }
        }
    }

    async fn fetch(&self, ip: Ipv4Addr) -> Result<HopLocation, LookupFailure> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupFailure::Status(status.as_u16()));
        }

        let body: GeoResponse = response.json().await?;
        parse_location(ip, body)
    }
}

fn parse_location(ip: Ipv4Addr, body: GeoResponse) -> Result<HopLocation, LookupFailure> {
    match body.status.as_deref() {
        Some("success") => {}
        Some(other) => {
            let reason = body.message.unwrap_or_else(|| other.to_string());
            return Err(LookupFailure::Rejected(reason));
        }
        None => return Err(LookupFailure::Malformed("missing status".to_string())),
    }

    let lat = body
        .lat
        .filter(|lat| (-90.0..=90.0).contains(lat))
        .ok_or_else(|| LookupFailure::Malformed("missing or invalid lat".to_string()))?;
    let lon = body
        .lon
        .filter(|lon| (-180.0..=180.0).contains(lon))
        .ok_or_else(|| LookupFailure::Malformed("missing or invalid lon".to_string()))?;
    let country = body
        .country_code
        .filter(|code| code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .ok_or_else(|| LookupFailure::Malformed("missing or invalid countryCode".to_string()))?;
    let city = body
        .city
        .filter(|city| !city.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_CITY.to_string());

    Ok(HopLocation {
        ip,
        lat,
        lon,
        country,
        city,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn resolver(server: &MockServer) -> LocationResolver {
        LocationResolver::new(format!("{}/json", server.uri()), Duration::from_secs(3)).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_success_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/93.184.216.34"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "country": "United States",
                "countryCode": "US",
                "city": "Norwell",
                "lat": 42.1508,
                "lon": -70.8228,
                "query": "93.184.216.34"
            })))
            .mount(&mock_server)
            .await;

        let lookup = resolver(&mock_server).resolve(ip("93.184.216.34")).await;

        assert_eq!(
            lookup,
            Lookup::Resolved(HopLocation {
                ip: ip("93.184.216.34"),
                lat: 42.1508,
                lon: -70.8228,
                country: "US".to_string(),
                city: "Norwell".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_missing_city_defaults_to_unknown() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/1.1.1.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "countryCode": "AU",
                "lat": -27.4766,
                "lon": 153.0166
            })))
            .mount(&mock_server)
            .await;

        let location = resolver(&mock_server)
            .resolve(ip("1.1.1.1"))
            .await
            .into_location()
            .unwrap();

        assert_eq!(location.city, "Unknown");
        assert_eq!(location.country, "AU");
    }

    #[tokio::test]
    async fn test_fail_status_is_unresolved() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "fail",
                "message": "private range",
                "query": "10.0.0.1"
            })))
            .mount(&mock_server)
            .await;

        let lookup = resolver(&mock_server).resolve(ip("10.0.0.1")).await;

        assert_eq!(
            lookup,
            Lookup::Unresolved(LookupFailure::Rejected("private range".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unexpected_status_value_is_unresolved() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCESS",
                "countryCode": "US",
                "lat": 1.0,
                "lon": 1.0
            })))
            .mount(&mock_server)
            .await;

        assert!(!resolver(&mock_server).resolve(ip("8.8.8.8")).await.is_resolved());
    }

    #[tokio::test]
    async fn test_http_error_is_unresolved() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let lookup = resolver(&mock_server).resolve(ip("8.8.8.8")).await;
        assert_eq!(lookup, Lookup::Unresolved(LookupFailure::Status(429)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_unresolved() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/8.8.8.8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/8.8.4.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "countryCode": "US"
            })))
            .mount(&mock_server)
            .await;

        let resolver = resolver(&mock_server);
        assert!(matches!(
            resolver.resolve(ip("8.8.8.8")).await,
            Lookup::Unresolved(LookupFailure::Malformed(_))
        ));
        assert!(matches!(
            resolver.resolve(ip("8.8.4.4")).await,
            Lookup::Unresolved(LookupFailure::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let resolver =
            LocationResolver::new(format!("{}/json", mock_server.uri()), Duration::from_millis(200))
                .unwrap();

        assert_eq!(
            resolver.resolve(ip("8.8.8.8")).await,
            Lookup::Unresolved(LookupFailure::Timeout)
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unresolved() {
        // Port 9 (discard) on loopback is not listening in test environments
        let resolver =
            LocationResolver::new("http://127.0.0.1:9/json", Duration::from_secs(1)).unwrap();

        assert!(matches!(
            resolver.resolve(ip("8.8.8.8")).await,
            Lookup::Unresolved(LookupFailure::Transport(_) | LookupFailure::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_repeated_lookup_is_identical() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "countryCode": "DE",
                "city": "Frankfurt am Main",
                "lat": 50.1109,
                "lon": 8.6821
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let resolver = resolver(&mock_server);
        let first = resolver.resolve(ip("80.81.192.1")).await;
        let second = resolver.resolve(ip("80.81.192.1")).await;
        assert!(first.is_resolved());
        assert_eq!(first, second);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let resolver = LocationResolver::with_client(Client::new(), "http://ip-api.com/json/");
        assert_eq!(resolver.base_url(), "http://ip-api.com/json");
    }
}
