//! Request classification and caching strategies.
//!
//! The route table maps URL predicates to strategies and namespaces; the
//! strategy executor turns a matched request into a response.

mod rules;
mod strategy;
mod table;

pub use rules::{is_same_origin, RouteRule};
pub use strategy::{execute, virtual_key_variants, Outcome, Revalidation, StrategyContext};
pub use table::{Route, RouteTable, Strategy};
