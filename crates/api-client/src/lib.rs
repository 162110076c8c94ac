//! Reqwest-backed remote gateway for the bookkeeping REST API.

mod client;
mod types;

pub use client::ApiClient;
pub use types::{ApiErrorResponse, CardsEnvelope, SuccessResponse};
