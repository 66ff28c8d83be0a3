//! finscan - financial-disclosure extraction.
//!
//! Core library exposing the data model, configuration, and the collaborator
//! seams (object storage, work queue, cloud budget) used by the extraction
//! engine in `finscan-extract`.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod budget;
pub mod config;
pub mod models;
pub mod retry;
pub mod storage;
pub mod work_queue;
