//! Response types shared by the origin client and the proxy service

use std::fmt;
use std::pin::Pin;

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures::Stream;

use crate::domain::cache::CacheStatus;
use crate::domain::DomainError;

/// Stream of body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DomainError>> + Send>>;

pub enum ResponseBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl ResponseBody {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// What the proxy hands back to the HTTP layer
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
    pub cache_status: CacheStatus,
}
