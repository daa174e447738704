//! Request and response values passed between the router, the caches and
//! the network.

mod request;
mod response;

pub use request::{cache_key, FetchRequest};
pub use response::{FetchResponse, SyntheticResponse};
