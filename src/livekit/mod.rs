//! LiveKit transport for the agent.
//!
//! [`LiveKitRoom`] implements [`RoomConnection`](crate::agent::RoomConnection)
//! on the `livekit` SDK. [`mint_agent_token`] issues the join token the agent
//! uses for itself.

mod client;
mod token;

pub use client::{LiveKitRoom, LiveKitSink};
pub use token::{AgentIdentity, mint_agent_token};
