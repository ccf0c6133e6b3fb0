//! Origin service client

mod http;

pub use http::{HttpOriginClient, OriginConfig};
