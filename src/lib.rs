//! Chronos Admin Library
//!
//! Operator tooling for the Chronos barbershop backend: resolving staff
//! identifications to login emails, signing in on their behalf, resetting
//! credentials, patching profiles and provisioning admin accounts.
//!
//! # Modules
//!
//! - `core`: Identification rules, resolver and account operations.
//! - `integrations`: Clients for the hosted data, auth and Postgres endpoints.
//! - `accounts`: Single-account operations keyed by identification.
//! - `auth_client`: Auth service client (sign-in, admin user management).
//! - `config`: Configuration loading.
//! - `credentials`: Password generation and email validation.
//! - `db`: Direct Postgres access for the resolver and its audit.
//! - `errors`: Error handling types.
//! - `identification`: The identification type and its normalization.
//! - `models`: Data and auth API models.
//! - `provisioning`: Bulk admin account provisioning.
//! - `resolver`: Identification → email resolution.
//! - `rest_client`: Data API client.

pub mod core;
pub mod integrations;

pub mod accounts;
pub mod auth_client;
pub mod config;
pub mod credentials;
pub mod db;
pub mod errors;
pub mod identification;
pub mod models;
pub mod provisioning;
pub mod resolver;
pub mod rest_client;
