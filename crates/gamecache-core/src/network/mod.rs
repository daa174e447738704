//! Network access for the caching strategies.
//!
//! This module provides:
//! - The [`Fetcher`] trait every strategy goes through
//! - A reqwest-backed [`HttpFetcher`]
//! - A scripted [`StubFetcher`] for tests and offline harnesses

mod client;
mod stub;

pub use client::{Fetcher, HttpFetcher};
pub use stub::StubFetcher;
