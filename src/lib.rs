//! lectern - event-driven recording pipeline for a lecture-capture platform.
//!
//! The core is a broker-backed orchestration layer: a recording walks from
//! uploaded media through audio extraction, a queued transcription task,
//! the drained recognition result, and note generation. The same
//! publish/consume primitive also carries teacher-certification requests
//! and user notification fan-out.

pub mod broker;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod migrations;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod server;
pub mod services;
pub mod session;
pub mod workflows;
