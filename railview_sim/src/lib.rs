//! RailView Deterministic Simulation Harness
//!
//! This crate runs corridor scenarios headlessly against an in-memory
//! surface, under a virtual clock, and checks the overlay invariants.
//!
//! # Core Principle: Controlled Inputs
//!
//! Every source of variation is owned by the harness:
//! - **Time**: `SimContext` only moves when the runner advances it
//! - **Surface**: `MemorySurface` can be taken down and brought back
//! - **Live data**: `LiveFeed` draws jitter, gaps and reordering from a
//!   seeded ChaCha8 stream
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────┐   ┌───────────────────┐   ┌────────────┐  │
//! │  │  SimContext  │──►│ SimulationRuntime │──►│  Memory    │  │
//! │  │ (virtual t)  │   │  clock → model →  │   │  Surface   │  │
//! │  └──────────────┘   │  overlay, view    │   └────────────┘  │
//! │                     └─────────▲─────────┘                   │
//! │                               │ live batches                │
//! │                     ┌─────────┴─────────┐                   │
//! │                     │     LiveFeed      │                   │
//! │                     └───────────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use railview_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_duration(200.0).run(ScenarioId::Corridor);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod live_feed;
mod runner;
mod surface;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{SimEvent, SimExport, SimFrame, TrainFrame};
pub use live_feed::{FeedError, LiveFeed, LiveFeedConfig, LiveFeedStats};
pub use runner::{detect_contacts, ContactEvent, ContactKind, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use surface::{Flight, MemorySurface, StyleChange};
