//! Loan Approval API Library
//!
//! This library provides the core functionality for the loan approval
//! service: normalization of untrusted application records, the decision
//! engine with its rule-based fallback, batch scoring, the cached
//! latest-results façade, and the batch pipeline that persists predictions.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core decision logic.
//! - `integrations`: External service integrations.
//! - `classifier`: Classifier capability and model artifact loading.
//! - `circuit_breaker`: Circuit breaker for object-store reads.
//! - `config`: Configuration management.
//! - `decision`: Per-application decision engine.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `normalizer`: Raw record coercion.
//! - `openapi`: OpenAPI document.
//! - `pipeline`: Extract, process and predict stages.
//! - `result_cache`: TTL cache for the latest bundle.
//! - `scorer`: Batch scoring.
//! - `services`: Latest-results serving façade.
//! - `store_client`: Object store client and key layout.

pub mod api;
pub mod core;
pub mod integrations;

pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod openapi;
pub mod pipeline;
pub mod result_cache;
pub mod scorer;
pub mod services;
pub mod store_client;
