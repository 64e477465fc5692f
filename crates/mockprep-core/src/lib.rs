//! mockprep-core: adaptive coaching and scoring engine.
//!
//! This crate turns a candidate's free-text interview answer into a validated
//! multi-dimensional score, keeps the running session aggregate, chooses the
//! next question and difficulty, and awards achievement badges. Persistence
//! sits behind the [`store::Store`] trait; the external scorer behind
//! [`traits::Scorer`].

pub mod badges;
pub mod bank;
pub mod coach;
pub mod config;
pub mod engine;
pub mod error;
pub mod in_memory;
pub mod memory;
pub mod model;
pub mod report;
pub mod scoring;
pub mod selector;
pub mod service;
pub mod store;
pub mod traits;
pub mod validator;
