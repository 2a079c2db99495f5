//! Terminal dashboard for a market-intelligence backend.
//!
//! The binary wires a [`config::Config`] and an [`api::ApiClient`] into an
//! [`app::App`], then drives it with crossterm events and renders through
//! [`ui::ui`]. Everything except terminal setup lives here so it can be
//! tested against ratatui's `TestBackend`.

pub mod api;
pub mod app;
pub mod chart;
pub mod config;
pub mod demo;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod flow;
pub mod input;
pub mod news;
pub mod pagination;
pub mod ui;
pub mod watchlist;
