mod base;
pub mod flights;
pub mod knowledge;
pub mod openai;
pub mod places;
pub mod tools;

pub use base::{
    AnnouncementCallback, BaseReasoner, ReasonerError, ReasonerResult, Role, Utterance,
};
pub use flights::{SerpApiFlights, SerpApiFlightsConfig, airport_code};
pub use knowledge::DirectoryKnowledgeStore;
pub use openai::{OpenAIReasoner, OpenAIReasonerConfig};
pub use places::{GooglePlaces, GooglePlacesConfig};
pub use tools::{
    FlightLookup, FlightPriceTool, FlightQuery, KnowledgeStore, PlaceLookup, PlaceQuery,
    PlaceSearchTool, ReasonerTool, TravelInfoTool, narration_for,
};
