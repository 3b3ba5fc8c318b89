//! Flight prices from SerpAPI's Google Flights engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::{ReasonerError, ReasonerResult};
use super::tools::{FlightLookup, FlightQuery, GET_FLIGHT_PRICES};

pub const SERPAPI_BASE_URL: &str = "https://serpapi.com/search";

/// Options summarized per search.
pub const MAX_FLIGHT_OPTIONS: usize = 5;

/// Lowercase city names and their main airport.
const CITY_TO_AIRPORT: &[(&str, &str)] = &[
    ("new york", "JFK"),
    ("los angeles", "LAX"),
    ("san francisco", "SFO"),
    ("chicago", "ORD"),
    ("atlanta", "ATL"),
    ("boston", "BOS"),
    ("seattle", "SEA"),
    ("miami", "MIA"),
    ("washington", "IAD"),
    ("dallas", "DFW"),
    ("denver", "DEN"),
    ("las vegas", "LAS"),
    ("toronto", "YYZ"),
    ("vancouver", "YVR"),
    ("mexico city", "MEX"),
    ("london", "LHR"),
    ("paris", "CDG"),
    ("amsterdam", "AMS"),
    ("frankfurt", "FRA"),
    ("berlin", "BER"),
    ("munich", "MUC"),
    ("zurich", "ZRH"),
    ("madrid", "MAD"),
    ("barcelona", "BCN"),
    ("lisbon", "LIS"),
    ("rome", "FCO"),
    ("milan", "MXP"),
    ("athens", "ATH"),
    ("istanbul", "IST"),
    ("dubai", "DXB"),
    ("tokyo", "NRT"),
    ("osaka", "KIX"),
    ("kyoto", "KIX"),
    ("seoul", "ICN"),
    ("beijing", "PEK"),
    ("shanghai", "PVG"),
    ("hong kong", "HKG"),
    ("singapore", "SIN"),
    ("bangkok", "BKK"),
    ("bali", "DPS"),
    ("delhi", "DEL"),
    ("mumbai", "BOM"),
    ("sydney", "SYD"),
    ("melbourne", "MEL"),
    ("auckland", "AKL"),
    ("cairo", "CAI"),
    ("cape town", "CPT"),
    ("sao paulo", "GRU"),
    ("rio de janeiro", "GIG"),
    ("buenos aires", "EZE"),
];

/// IATA code for a city name, or the input unchanged when it is unknown.
///
/// Exact city names win, then anything that already looks like a code, then
/// the first city contained in (or containing) the input.
pub fn airport_code(location: &str) -> String {
    let wanted = location.trim().to_lowercase();
    if let Some((_, code)) = CITY_TO_AIRPORT.iter().find(|(city, _)| *city == wanted) {
        return code.to_string();
    }
    let trimmed = location.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_uppercase()) {
        return trimmed.to_string();
    }
    if !wanted.is_empty()
        && let Some((_, code)) = CITY_TO_AIRPORT
            .iter()
            .find(|(city, _)| wanted.contains(city) || city.contains(wanted.as_str()))
    {
        return code.to_string();
    }
    trimmed.to_string()
}

/// "2h 5m", "2h", "45m", or "N/A" for zero.
fn format_minutes(minutes: u64) -> String {
    let (hours, mins) = (minutes / 60, minutes % 60);
    match (hours, mins) {
        (0, 0) => "N/A".to_string(),
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[derive(Debug, Clone)]
pub struct SerpApiFlightsConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for SerpApiFlightsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: SERPAPI_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    best_flights: Option<Vec<FlightOption>>,
    #[serde(default)]
    other_flights: Option<Vec<FlightOption>>,
    #[serde(default)]
    flights: Option<Vec<FlightOption>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlightOption {
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    layovers: Option<Vec<Layover>>,
    #[serde(rename = "type", default)]
    option_type: Option<String>,
    #[serde(default)]
    flights: Option<Vec<Leg>>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    #[serde(default)]
    departure_airport: Option<Airport>,
    #[serde(default)]
    arrival_airport: Option<Airport>,
    #[serde(default)]
    airline: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Airport {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Layover {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    overnight: Option<bool>,
}

// =============================================================================
// Summary handed to the model
// =============================================================================

#[derive(Debug, Serialize)]
struct FlightOffer {
    price: Option<f64>,
    total_duration: String,
    total_duration_minutes: u64,
    departure_time: String,
    departure_airport: String,
    departure_airport_id: String,
    arrival_time: String,
    arrival_airport: String,
    arrival_airport_id: String,
    airlines: Vec<String>,
    airline: String,
    stops: usize,
    layovers: Vec<String>,
    #[serde(rename = "type")]
    option_type: String,
    num_legs: usize,
}

#[derive(Debug, Serialize)]
struct PriceSummary {
    cheapest_price: f64,
    most_expensive_price: f64,
    average_price: f64,
    price_range: String,
}

#[derive(Debug, Serialize)]
struct FlightSearchResult<'a> {
    departure: &'a str,
    arrival: &'a str,
    date: &'a str,
    return_date: Option<&'a str>,
    flight_type: &'static str,
    flights: Vec<FlightOffer>,
    count: usize,
    summary: Option<PriceSummary>,
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| "N/A".to_string())
}

impl FlightOption {
    fn into_offer(self) -> Option<FlightOffer> {
        let legs = self.flights.filter(|legs| !legs.is_empty())?;
        let first = legs.first()?.departure_airport.clone().unwrap_or_default();
        let last = legs.last()?.arrival_airport.clone().unwrap_or_default();

        let mut airlines: Vec<String> = Vec::new();
        for airline in legs.iter().filter_map(|leg| leg.airline.as_deref()) {
            if !airline.is_empty() && !airlines.iter().any(|a| a == airline) {
                airlines.push(airline.to_string());
            }
        }

        let layovers: Vec<String> = self
            .layovers
            .unwrap_or_default()
            .into_iter()
            .map(|layover| {
                let mut desc = format!(
                    "{} ({})",
                    layover.name.unwrap_or_else(|| "Unknown".to_string()),
                    format_minutes(layover.duration.unwrap_or(0))
                );
                if layover.overnight.unwrap_or(false) {
                    desc.push_str(" [overnight]");
                }
                desc
            })
            .collect();

        let minutes = self.total_duration.unwrap_or(0);
        Some(FlightOffer {
            price: self.price,
            total_duration: format_minutes(minutes),
            total_duration_minutes: minutes,
            departure_time: or_na(first.time),
            departure_airport: or_na(first.name),
            departure_airport_id: or_na(first.id),
            arrival_time: or_na(last.time),
            arrival_airport: or_na(last.name),
            arrival_airport_id: or_na(last.id),
            airline: if airlines.is_empty() {
                "Unknown".to_string()
            } else {
                airlines.join(", ")
            },
            airlines,
            stops: layovers.len(),
            layovers,
            option_type: self.option_type.unwrap_or_else(|| "Unknown".to_string()),
            num_legs: legs.len(),
        })
    }
}

fn price_summary(offers: &[FlightOffer]) -> Option<PriceSummary> {
    let prices: Vec<f64> = offers.iter().filter_map(|o| o.price).collect();
    if prices.is_empty() {
        return None;
    }
    let cheapest = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let priciest = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(PriceSummary {
        cheapest_price: cheapest,
        most_expensive_price: priciest,
        average_price: prices.iter().sum::<f64>() / prices.len() as f64,
        price_range: format!("${cheapest:.0} - ${priciest:.0}"),
    })
}

// =============================================================================
// Client
// =============================================================================

/// [`FlightLookup`] backed by SerpAPI.
pub struct SerpApiFlights {
    config: SerpApiFlightsConfig,
    http_client: Client,
}

impl SerpApiFlights {
    pub fn new(config: SerpApiFlightsConfig) -> ReasonerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ReasonerError::ConfigurationError(
                "SerpAPI key is required".to_string(),
            ));
        }
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ReasonerError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn tool_error(message: impl Into<String>) -> ReasonerError {
        ReasonerError::ToolFailed {
            name: GET_FLIGHT_PRICES.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl FlightLookup for SerpApiFlights {
    async fn flight_prices(&self, query: &FlightQuery) -> ReasonerResult<String> {
        if query.date.trim().is_empty() {
            return Err(Self::tool_error("a departure date is required"));
        }

        let departure_id = airport_code(&query.departure);
        let arrival_id = airport_code(&query.arrival);
        let return_date = query.return_date.as_deref().filter(|d| !d.trim().is_empty());
        let round_trip = return_date.is_some() || query.flight_type.as_deref() == Some("round-trip");
        let currency = query.currency.as_deref().unwrap_or("USD");

        let mut params: Vec<(&str, &str)> = vec![
            ("engine", "google_flights"),
            ("api_key", self.config.api_key.as_str()),
            ("departure_id", departure_id.as_str()),
            ("arrival_id", arrival_id.as_str()),
            ("currency", currency),
            ("outbound_date", query.date.as_str()),
            ("type", if round_trip { "1" } else { "2" }),
        ];
        if let Some(return_date) = return_date {
            params.push(("return_date", return_date));
        }

        info!(
            departure = %departure_id,
            arrival = %arrival_id,
            date = %query.date,
            round_trip,
            "Searching flights"
        );
        let response = self
            .http_client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ReasonerError::NetworkError(format!("Flight search failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReasonerError::NetworkError(format!("Failed to read response: {e}")))?;
        let parsed: SearchResponse = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            let message = format!(
                "SerpAPI error ({status}): {}",
                parsed.error.as_deref().unwrap_or(&body)
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED => ReasonerError::AuthenticationFailed(message),
                StatusCode::TOO_MANY_REQUESTS => ReasonerError::RateLimitExceeded(message),
                _ => ReasonerError::ProviderError(message),
            });
        }
        if let Some(error) = parsed.error {
            return Err(ReasonerError::ProviderError(format!("SerpAPI error: {error}")));
        }

        let mut options: Vec<FlightOption> = parsed
            .best_flights
            .unwrap_or_default()
            .into_iter()
            .chain(parsed.other_flights.unwrap_or_default())
            .collect();
        if options.is_empty() {
            options = parsed.flights.unwrap_or_default();
        }

        let flights: Vec<FlightOffer> = options
            .into_iter()
            .take(MAX_FLIGHT_OPTIONS)
            .filter_map(FlightOption::into_offer)
            .collect();
        debug!(count = flights.len(), "Flight options found");

        let result = FlightSearchResult {
            departure: &query.departure,
            arrival: &query.arrival,
            date: &query.date,
            return_date,
            flight_type: if round_trip { "round-trip" } else { "one-way" },
            count: flights.len(),
            summary: price_summary(&flights),
            flights,
        };
        serde_json::to_string(&result)
            .map_err(|e| ReasonerError::InvalidResponse(format!("Failed to encode flights: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airport_code_lookup_order() {
        assert_eq!(airport_code("Tokyo"), "NRT");
        assert_eq!(airport_code("  new york "), "JFK");
        assert_eq!(airport_code("ATL"), "ATL");
        assert_eq!(airport_code("Downtown Chicago"), "ORD");
        assert_eq!(airport_code("Reykjavik"), "Reykjavik");
        // Lowercase three-letter input is not treated as a code
        assert_eq!(airport_code("rom"), "FCO");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "N/A");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(125), "2h 5m");
    }

    #[test]
    fn test_option_without_legs_is_skipped() {
        let option: FlightOption = serde_json::from_str(r#"{"price": 300, "flights": []}"#).unwrap();
        assert!(option.into_offer().is_none());
    }

    #[test]
    fn test_new_requires_key() {
        assert!(matches!(
            SerpApiFlights::new(SerpApiFlightsConfig::default()),
            Err(ReasonerError::ConfigurationError(_))
        ));
    }
}
