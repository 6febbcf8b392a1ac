//! SSO Module
//!
//! Central authentication service: runs pluggable authentication handlers
//! over presented credentials, issues and validates tickets (login sessions,
//! service tickets, proxy chains) and revokes whole session trees on logout.
//!
//! Provides the `CentralAuthenticationServiceClient` implementation consumed
//! by protocol adapters. Build one with [`module::SsoModule::builder`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;
