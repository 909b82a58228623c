//! # Tethered Game Server Library
//!
//! This library provides the authoritative server for a two-player,
//! tether-linked cooperative platformer. Clients only send input; the server
//! owns physics, win conditions and the match lifecycle, and broadcasts a
//! snapshot of every room each tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Each room steps its players against the room's level at a fixed rate:
//! gravity and horizontal control, collisions with solid tiles, one-way
//! moving lifts and water, the elastic tether that binds the two players,
//! and the goal lock that ends a round.
//!
//! ### Room Lifecycle
//! Connections create or join rooms by a short code. The first two members
//! take the player slots, everyone after them spectates. A room starts
//! playing once both slots are filled and is deleted when its last member
//! leaves.
//!
//! ### State Broadcasting
//! After every tick each member of a room receives the room snapshot in the
//! wire format it last used (JSON text or bincode binary frames).
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! One task owns every room and session. Connection tasks only decode
//! frames into events and write queued frames back out, so game state is
//! never shared between tasks. A room whose tick panics is closed on its
//! own without disturbing the others.
//!
//! ## Module Organization
//!
//! - `level`: turns a loosely-typed level description into a [`world::World`]
//! - `world`: compiled geometry and the moving lift driver
//! - `physics`: rectangle and vector primitives
//! - `player`: per-player integration and collision resolution
//! - `tether`: the distance constraint between the two players
//! - `game`: the room state machine (`waiting`, `playing`, `won`)
//! - `lobby`: room directory and request handling
//! - `client_manager`: per-connection sessions and outbound routing
//! - `level_store`: lenient level file lookup and listing
//! - `network`: WebSocket transport and the tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!
//!     // Accepts WebSocket clients, applies their requests between ticks
//!     // and broadcasts room snapshots at the configured tick rate
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod error;
pub mod game;
pub mod level;
pub mod level_store;
pub mod lobby;
pub mod network;
pub mod physics;
pub mod player;
pub mod tether;
pub mod utils;
pub mod world;
