//! HTTP + WebSocket surface for the color game engine.
//!
//! Read endpoints for round state and history, a bet-placement endpoint, a
//! WebSocket fan-out of round events, health and metrics.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
