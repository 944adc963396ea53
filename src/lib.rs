// SPDX-License-Identifier: MIT

//! Vidtube: backend API for a small video-sharing platform.
//!
//! This crate provides user registration and authentication (access/refresh
//! token lifecycle with single-slot rotation), profile management with media
//! assets proxied to an external storage service, and read-only social-graph
//! queries (channel profiles, watch history) on top of a document database.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use services::{MediaStorage, TokenService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub storage: MediaStorage,
    pub tokens: TokenService,
}
