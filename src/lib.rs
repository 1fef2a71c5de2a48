//! # kgs-bridge
//!
//! Drives the interactive knowledge-graph search engine console as if it
//! were a structured service.
//!
//! The engine is a menu-driven program that reads choices from stdin and
//! prints free-text reports. This crate spawns it, answers its prompts,
//! captures its output under a deadline, and scrapes the report into typed
//! records.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ Operation │──▶│   Script   │──▶│  Session  │──▶│  Parser  │
//! │           │   │  builder   │   │ (engine)  │   │          │
//! └───────────┘   └────────────┘   └───────────┘   └────┬─────┘
//!                        Orchestrator (single slot)      │
//!                                                        ▼
//!                      ┌──────────┐               ┌──────────────┐
//!                      │   CLI    │◀──────────────│ ParsedReport │
//!                      │  (kgs)   │   HTTP API ◀──│              │
//!                      └──────────┘               └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kgs upload notes.txt report.txt   # copy documents for the engine
//! kgs process                       # let the engine index them
//! kgs search "graph"
//! kgs path cat pet
//! kgs serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`script`] | Operation → menu input lines |
//! | [`session`] | Engine process lifecycle |
//! | [`parser`] | Engine output → structured report |
//! | [`orchestrator`] | Single-slot operation runner |
//! | [`multipart`] | `multipart/form-data` decoding |
//! | [`upload`] | Writing uploads to the documents directory |
//! | [`render`] | CLI text output |
//! | [`server`] | HTTP API |

pub mod config;
pub mod error;
pub mod models;
pub mod multipart;
pub mod orchestrator;
pub mod parser;
pub mod render;
pub mod script;
pub mod server;
pub mod session;
pub mod upload;
