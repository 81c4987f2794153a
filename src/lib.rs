//! Shelfcam — orchestration core for the camera capture / shelf scan
//! controller.
//!
//! This crate coordinates several independently-running background
//! tasks from a single controlling process: in-process capture service
//! supervision, a passive "existing images" source, and two external
//! tool processes (shelf scan, camera display) supervised with live
//! line-streamed output and graceful-then-forceful termination.
//!
//! The windowed UI, camera I/O, and the tool implementations themselves
//! are external collaborators; they consume this crate through
//! [`core::Orchestrator`] and the collaborator traits in
//! [`core::capture`].

pub mod core;
pub mod error;
pub mod paths;

pub use error::Error;
