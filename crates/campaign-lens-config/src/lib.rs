// crates/campaign-lens-config/src/lib.rs
// ============================================================================
// Module: Campaign Lens Config Library
// Description: Configuration model and validation for Campaign Lens.
// Purpose: Single source of truth for campaign-lens.toml and its env overlay.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `campaign-lens-config` loads an optional TOML file, overlays process
//! environment variables, and validates the result before any server
//! component is built. OAuth secrets are deliberately optional here; missing
//! secrets surface later as authentication errors so the server still starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
