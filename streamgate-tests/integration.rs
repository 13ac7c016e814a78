//! Integration tests for Streamgate
//!
//! Drive the full HTTP surface (router, responder, fetcher, simulated or
//! mocked Telegram backend) and check the externally visible behavior:
//! exact byte windows, status codes, resource release on disconnect and
//! the ingest to stream round trip.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/concurrency.rs"]
mod concurrency;
#[path = "integration/disconnect.rs"]
mod disconnect;
#[path = "integration/not_found.rs"]
mod not_found;
#[path = "integration/range_requests.rs"]
mod range_requests;
#[path = "integration/round_trip.rs"]
mod round_trip;
#[path = "integration/telegram_backend.rs"]
mod telegram_backend;
