// ABOUTME: Main library entry point for the OpsVault credential and aggregation core
// ABOUTME: Encrypted OAuth credential storage plus multi-provider financial data fan-out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

#![deny(unsafe_code)]

//! # OpsVault
//!
//! An OAuth credential vault and multi-provider data-aggregation core.
//! Business-data providers (accounting, payments, CRM, file storage) are
//! connected per user, their tokens stored encrypted at rest, and their data
//! fetched concurrently and normalized into one provider-agnostic summary.
//!
//! ## Architecture
//!
//! - **crypto**: master-key handling and the AES-256-GCM token cipher
//! - **secrets**: layered credential resolution (`env:` indirection,
//!   encrypted payloads, plaintext passthrough)
//! - **database**: SQLite-backed credential store, encrypting at the edges
//! - **oauth**: authorization-flow initiation and token refresh
//! - **providers**: per-provider data adapters behind one trait
//! - **aggregator**: concurrent fan-out with per-provider failure isolation
//! - **migration**: idempotent plaintext-to-encrypted sweep

/// Concurrent multi-provider aggregation orchestrator
pub mod aggregator;

/// Environment-driven server configuration
pub mod config;

/// Shared string and tuning constants
pub mod constants;

/// Master key and token cipher
pub mod crypto;

/// SQLite credential store
pub mod database;

/// Unified error taxonomy
pub mod errors;

/// Encryption migration sweep
pub mod migration;

/// Shared data model
pub mod models;

/// OAuth flow initiation and token refresh
pub mod oauth;

/// Provider data adapters and registry
pub mod providers;

/// REST route handlers
pub mod routes;

/// Layered credential resolution
pub mod secrets;
