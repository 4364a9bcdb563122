//! HTTP service that turns a local causal language model into a generator of polite Japanese
//! excuses and chat auto-replies.
//!
//! Every generation goes through one [`inference::client::ModelClient`]. When the model fails the
//! services answer with canned text instead of an error.

pub mod api;
pub mod config;
pub mod error;
mod extractors;
pub mod inference;
pub mod service;
pub mod task;
pub mod telemetry;
