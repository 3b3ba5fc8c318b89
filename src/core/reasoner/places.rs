//! Place search against the Google Places web service.
//!
//! A text search finds candidates, then each candidate's details (reviews,
//! coordinates) are fetched concurrently. A failed details call keeps the
//! candidate with what the text search returned.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{ReasonerError, ReasonerResult};
use super::tools::{PlaceLookup, PlaceQuery};

pub const GOOGLE_PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

pub const DEFAULT_MAX_RESULTS: u32 = 5;

const MAX_REVIEWS: usize = 5;
const REVIEW_CHARS: usize = 200;
const DETAIL_FIELDS: &str = "name,rating,reviews,formatted_address,geometry,types";

#[derive(Debug, Clone)]
pub struct GooglePlacesConfig {
    pub api_key: String,
    /// Base of the `textsearch/json` and `details/json` endpoints
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for GooglePlacesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: GOOGLE_PLACES_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceResult>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    types: Option<Vec<String>>,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    reviews: Option<Vec<Review>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Review {
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    text: Option<String>,
}

// =============================================================================
// Summary handed to the model
// =============================================================================

#[derive(Debug, Serialize)]
struct PlaceReview {
    author: String,
    rating: f64,
    text: String,
}

#[derive(Debug, Serialize)]
struct PlaceSummary {
    name: String,
    rating: f64,
    address: String,
    reviews: Vec<PlaceReview>,
    review_count: usize,
    types: Vec<String>,
    location: Option<LatLng>,
}

#[derive(Debug, Serialize)]
struct PlaceSearchResult<'a> {
    query: &'a str,
    places: Vec<PlaceSummary>,
    count: usize,
}

impl PlaceSummary {
    /// Merge details over the text-search hit; details win field by field.
    fn merge(hit: PlaceResult, details: Option<PlaceResult>) -> Self {
        let details = details.unwrap_or_default();
        let reviews: Vec<PlaceReview> = details
            .reviews
            .unwrap_or_default()
            .into_iter()
            .take(MAX_REVIEWS)
            .map(|review| PlaceReview {
                author: review.author_name.unwrap_or_else(|| "Anonymous".to_string()),
                rating: review.rating.unwrap_or(0.0),
                text: review
                    .text
                    .unwrap_or_default()
                    .chars()
                    .take(REVIEW_CHARS)
                    .collect(),
            })
            .collect();

        Self {
            name: details
                .name
                .or(hit.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            rating: details.rating.or(hit.rating).unwrap_or(0.0),
            address: details
                .formatted_address
                .or(hit.formatted_address)
                .unwrap_or_else(|| "Address not available".to_string()),
            review_count: reviews.len(),
            reviews,
            types: details.types.or(hit.types).unwrap_or_default(),
            location: details.geometry.and_then(|g| g.location),
        }
    }
}

/// Text sent to the search endpoint.
fn search_text(query: &PlaceQuery) -> String {
    let mut text = match query.location.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(location) => format!("{} in {location}", query.query),
        None => query.query.clone(),
    };
    if let Some(place_type) = query.place_type.as_deref().filter(|t| !t.trim().is_empty()) {
        text.push(' ');
        text.push_str(place_type);
    }
    text
}

// =============================================================================
// Client
// =============================================================================

/// [`PlaceLookup`] backed by Google Places.
pub struct GooglePlaces {
    config: GooglePlacesConfig,
    http_client: Client,
}

impl GooglePlaces {
    pub fn new(config: GooglePlacesConfig) -> ReasonerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ReasonerError::ConfigurationError(
                "Google Places API key is required".to_string(),
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

    fn url(&self, endpoint: &str) -> String {
        crate::core::openai::endpoint(&self.config.base_url, endpoint)
    }

    async fn text_search(&self, text: &str) -> ReasonerResult<Vec<PlaceResult>> {
        let response = self
            .http_client
            .get(self.url("textsearch/json"))
            .query(&[("query", text), ("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ReasonerError::NetworkError(format!("Place search failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasonerError::ProviderError(format!(
                "Google Places error ({status}): {body}"
            )));
        }
        let parsed: TextSearchResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::InvalidResponse(format!("Failed to parse places: {e}")))?;

        match parsed.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(parsed.results),
            "REQUEST_DENIED" => Err(ReasonerError::AuthenticationFailed(format!(
                "Google Places API returned status: {}{}",
                parsed.status,
                parsed
                    .error_message
                    .map(|m| format!(" - {m}"))
                    .unwrap_or_default()
            ))),
            "OVER_QUERY_LIMIT" => Err(ReasonerError::RateLimitExceeded(
                "Google Places API returned status: OVER_QUERY_LIMIT".to_string(),
            )),
            other => Err(ReasonerError::ProviderError(format!(
                "Google Places API returned status: {other}{}",
                parsed
                    .error_message
                    .map(|m| format!(" - {m}"))
                    .unwrap_or_default()
            ))),
        }
    }

    async fn details(&self, place_id: &str) -> ReasonerResult<PlaceResult> {
        let response = self
            .http_client
            .get(self.url("details/json"))
            .query(&[
                ("place_id", place_id),
                ("fields", DETAIL_FIELDS),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ReasonerError::NetworkError(format!("Place details failed: {e}")))?
            .error_for_status()
            .map_err(|e| ReasonerError::ProviderError(e.to_string()))?;

        let parsed: DetailsResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::InvalidResponse(format!("Failed to parse details: {e}")))?;
        match (parsed.status.as_str(), parsed.result) {
            ("OK", Some(result)) => Ok(result),
            (status, _) => Err(ReasonerError::ProviderError(format!(
                "Place details returned status: {status}"
            ))),
        }
    }
}

#[async_trait]
impl PlaceLookup for GooglePlaces {
    async fn search_places(&self, query: &PlaceQuery) -> ReasonerResult<String> {
        let text = search_text(query);
        let max_results = query.max_results.unwrap_or(DEFAULT_MAX_RESULTS) as usize;
        info!(query = %text, max_results, "Searching places");

        let hits: Vec<PlaceResult> = self
            .text_search(&text)
            .await?
            .into_iter()
            .take(max_results)
            .filter(|hit| hit.place_id.is_some())
            .collect();

        let details = join_all(hits.iter().map(|hit| async move {
            let place_id = hit.place_id.as_deref().unwrap_or_default();
            match self.details(place_id).await {
                Ok(details) => Some(details),
                Err(e) => {
                    warn!(place_id, "Falling back to search result: {e}");
                    None
                }
            }
        }))
        .await;

        let places: Vec<PlaceSummary> = hits
            .into_iter()
            .zip(details)
            .map(|(hit, details)| PlaceSummary::merge(hit, details))
            .collect();
        debug!(count = places.len(), "Places found");

        let result = PlaceSearchResult {
            query: &query.query,
            count: places.len(),
            places,
        };
        serde_json::to_string(&result)
            .map_err(|e| ReasonerError::InvalidResponse(format!("Failed to encode places: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(location: Option<&str>, place_type: Option<&str>) -> PlaceQuery {
        PlaceQuery {
            query: "cozy cafes".to_string(),
            location: location.map(str::to_string),
            place_type: place_type.map(str::to_string),
            max_results: None,
        }
    }

    #[test]
    fn test_search_text() {
        assert_eq!(search_text(&query(None, None)), "cozy cafes");
        assert_eq!(search_text(&query(Some("Lisbon"), None)), "cozy cafes in Lisbon");
        assert_eq!(
            search_text(&query(Some("Lisbon"), Some("cafe"))),
            "cozy cafes in Lisbon cafe"
        );
        assert_eq!(search_text(&query(Some("  "), None)), "cozy cafes");
    }

    #[test]
    fn test_merge_prefers_details_and_truncates_reviews() {
        let hit = PlaceResult {
            name: Some("Hit Name".to_string()),
            rating: Some(4.1),
            formatted_address: Some("Rua 1".to_string()),
            ..Default::default()
        };
        let long_text = "a".repeat(500);
        let details = PlaceResult {
            rating: Some(4.6),
            reviews: Some(
                (0..7)
                    .map(|i| Review {
                        author_name: (i > 0).then(|| format!("guest {i}")),
                        rating: Some(5.0),
                        text: Some(long_text.clone()),
                    })
                    .collect(),
            ),
            ..Default::default()
        };

        let summary = PlaceSummary::merge(hit, Some(details));
        assert_eq!(summary.name, "Hit Name");
        assert_eq!(summary.rating, 4.6);
        assert_eq!(summary.address, "Rua 1");
        assert_eq!(summary.review_count, 5);
        assert_eq!(summary.reviews[0].author, "Anonymous");
        assert_eq!(summary.reviews[0].text.len(), 200);
    }

    #[test]
    fn test_merge_without_details() {
        let summary = PlaceSummary::merge(PlaceResult::default(), None);
        assert_eq!(summary.name, "Unknown");
        assert_eq!(summary.address, "Address not available");
        assert!(summary.reviews.is_empty());
        assert!(summary.location.is_none());
    }
}
