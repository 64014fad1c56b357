//! Viridian - transaction processor logic for the Viridian business network
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Transaction Processing
//! - [`handlers`] - One handler per transaction type
//! - [`transaction`] - Transaction payloads and schema validation
//! - [`patch`] - Partial-update helper shared by the profile handlers
//! - [`runtime`] - Validates, executes and atomically commits transactions
//!
//! ## Records
//! - [`model`] - Participants, assets and relationships
//! - [`factory`] - Construction of resources and relationships
//! - [`context`] - Registries and metadata handed to a handler
//! - [`registry`] - Staged, typed registries over the record store
//! - [`persistence`] - Record stores (SQLite, in-memory)
//!
//! ## Identity Verification
//! - [`secret`] - Replica-deterministic secret providers
//! - [`notify`] - Exactly-once verification notices
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Transaction Processing
// ============================================================================
pub mod handlers;
pub mod patch;
pub mod runtime;
pub mod transaction;

// ============================================================================
// Records
// ============================================================================
pub mod context;
pub mod factory;
pub mod model;
pub mod persistence;
pub mod registry;

// ============================================================================
// Identity Verification
// ============================================================================
pub mod notify;
pub mod secret;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
