//! Guided workflow for creating and updating Application assets in a
//! metadata catalog.
//!
//! The session store ([`session`]) holds everything a run accumulates; the
//! active step is derived from it ([`workflow::state`]). Reads go through
//! [`catalog`], writes through [`workflow::submit`], and both reach the
//! backend via the reconnecting [`gateway`].
pub mod app;
pub mod backend;
pub mod batch;
pub mod catalog;
pub mod cli;
pub mod gateway;
pub mod labels;
pub mod report;
pub mod session;
pub mod settings;
pub mod terminal;
pub mod util;
pub mod workflow;
