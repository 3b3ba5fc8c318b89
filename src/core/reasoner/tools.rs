//! Tools the reasoner may call, and the narration spoken before each call.
//!
//! The lookups behind the tools (document store, flight prices, place search)
//! are reached through the contracts defined here. Implementations live in
//! [`super::knowledge`], [`super::flights`] and [`super::places`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::base::ReasonerResult;

pub const RETRIEVE_TRAVEL_INFO: &str = "retrieve_travel_info";
pub const GET_FLIGHT_PRICES: &str = "get_flight_prices";
pub const SEARCH_PLACES: &str = "search_places";

/// Function definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// A function the reasoner can invoke mid-turn.
#[async_trait]
pub trait ReasonerTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the arguments object.
    fn parameters(&self) -> Value;

    /// Sentence spoken to the caller before the tool runs.
    fn narration(&self, args: &Value) -> Option<String> {
        narration_for(self.name(), args)
    }

    /// Run the tool. The returned text is handed back to the model.
    async fn call(&self, args: Value) -> ReasonerResult<String>;

    fn definition(&self) -> ToolDef {
        ToolDef {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

fn arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Narration for a known tool call, derived from its arguments.
pub fn narration_for(tool: &str, args: &Value) -> Option<String> {
    match tool {
        RETRIEVE_TRAVEL_INFO => {
            let query = arg(args, "query").unwrap_or("travel information");
            Some(format!(
                "Let me check my travel archives for information about {query}..."
            ))
        }
        GET_FLIGHT_PRICES => {
            let departure = arg(args, "departure").unwrap_or("your departure city");
            let arrival = arg(args, "arrival").unwrap_or("your destination");
            Some(format!(
                "Let me look up flight prices from {departure} to {arrival} for you..."
            ))
        }
        SEARCH_PLACES => {
            let query = arg(args, "query").unwrap_or("places");
            Some(match arg(args, "location") {
                Some(location) => {
                    format!("Let me search for some great {query} in {location} for you...")
                }
                None => format!("Let me search for some great {query} for you..."),
            })
        }
        _ => None,
    }
}

// =============================================================================
// External Collaborator Contracts
// =============================================================================

/// Document store holding uploaded travel guides.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Passages relevant to `text`, best first.
    async fn query(&self, text: &str, destination: Option<&str>) -> ReasonerResult<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub departure: String,
    pub arrival: String,
    /// Outbound date, YYYY-MM-DD
    pub date: String,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub flight_type: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[async_trait]
pub trait FlightLookup: Send + Sync {
    async fn flight_prices(&self, query: &FlightQuery) -> ReasonerResult<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceQuery {
    pub query: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub max_results: Option<u32>,
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn search_places(&self, query: &PlaceQuery) -> ReasonerResult<String>;
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, args: Value) -> ReasonerResult<T> {
    serde_json::from_value(args).map_err(|e| super::base::ReasonerError::ToolFailed {
        name: tool.to_string(),
        message: format!("invalid arguments: {e}"),
    })
}

// =============================================================================
// Tools
// =============================================================================

/// Searches uploaded travel guides.
pub struct TravelInfoTool {
    store: Arc<dyn KnowledgeStore>,
}

impl TravelInfoTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct TravelInfoArgs {
    query: String,
    #[serde(default)]
    destination: Option<String>,
}

#[async_trait]
impl ReasonerTool for TravelInfoTool {
    fn name(&self) -> &'static str {
        RETRIEVE_TRAVEL_INFO
    }

    fn description(&self) -> &'static str {
        "Retrieve travel information (attractions, culture, tips) from uploaded travel guides. \
         Does not search the internet or live business listings."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look up"},
                "destination": {"type": "string", "description": "Destination to restrict the search to"}
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> ReasonerResult<String> {
        let args: TravelInfoArgs = parse_args(self.name(), args)?;
        let passages = self
            .store
            .query(&args.query, args.destination.as_deref())
            .await?;
        if passages.is_empty() {
            return Ok("No relevant travel information found in the archives.".to_string());
        }
        Ok(passages.join("\n\n"))
    }
}

/// Looks up flight prices between two cities.
pub struct FlightPriceTool {
    lookup: Arc<dyn FlightLookup>,
}

impl FlightPriceTool {
    pub fn new(lookup: Arc<dyn FlightLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl ReasonerTool for FlightPriceTool {
    fn name(&self) -> &'static str {
        GET_FLIGHT_PRICES
    }

    fn description(&self) -> &'static str {
        "Get flight prices between two cities. Only call once the user has stated the \
         departure city, arrival city and date."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "departure": {"type": "string", "description": "Departure city or airport code"},
                "arrival": {"type": "string", "description": "Arrival city or airport code"},
                "date": {"type": "string", "description": "Outbound date, YYYY-MM-DD"},
                "return_date": {"type": "string", "description": "Return date, YYYY-MM-DD"},
                "flight_type": {"type": "string", "enum": ["one-way", "round-trip"]},
                "currency": {"type": "string", "description": "Currency code, default USD"}
            },
            "required": ["departure", "arrival", "date"]
        })
    }

    async fn call(&self, args: Value) -> ReasonerResult<String> {
        let query: FlightQuery = parse_args(self.name(), args)?;
        self.lookup.flight_prices(&query).await
    }
}

/// Searches hotels, restaurants and attractions.
pub struct PlaceSearchTool {
    lookup: Arc<dyn PlaceLookup>,
}

impl PlaceSearchTool {
    pub fn new(lookup: Arc<dyn PlaceLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl ReasonerTool for PlaceSearchTool {
    fn name(&self) -> &'static str {
        SEARCH_PLACES
    }

    fn description(&self) -> &'static str {
        "Search for hotels, restaurants, cafes or attractions in a city using live listings."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "e.g. restaurants, cafes, hotels"},
                "location": {"type": "string", "description": "City to search in"},
                "place_type": {"type": "string", "description": "cafe, restaurant, hotel or tourist_attraction"},
                "max_results": {"type": "integer", "default": 5}
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> ReasonerResult<String> {
        let query: PlaceQuery = parse_args(self.name(), args)?;
        self.lookup.search_places(&query).await
    }
}
