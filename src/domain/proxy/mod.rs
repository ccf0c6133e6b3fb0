//! Proxy domain - requests, responses and the origin collaborator

mod origin;
mod request;
mod response;

pub use origin::{OriginClient, OriginResponse};
pub use request::{LookupMode, ProxyRequest, ANONYMOUS_CALLER};
pub use response::{ByteStream, ProxyResponse, ResponseBody};

#[cfg(test)]
pub use origin::mock::MockOriginClient;
