//! Payload codecs.
//!
//! A [`Codec`] is supplied as a constructor value rather than expressed
//! as a bound on the payload type -- the same payload type can be
//! stored under different wire representations by different caches.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Codec: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Serializes a payload for the disk and remote tiers.
    fn encode(&self, value: &Self::Value) -> Result<Bytes>;

    /// Reconstructs a payload from stored bytes.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value>;

    /// Cost charged against tier budgets for this payload.
    fn cost(&self, value: &Self::Value) -> u64;

    /// File extension used for the disk tier's backing files.
    fn extension(&self) -> &'static str;
}

/// Stores payloads as raw bytes, no transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Value = Bytes;

    fn encode(&self, value: &Bytes) -> Result<Bytes> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }

    fn cost(&self, value: &Bytes) -> u64 {
        value.len() as u64
    }

    fn extension(&self) -> &'static str {
        "bin"
    }
}

/// Stores payloads as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::DecodeFailed(e.to_string()))
    }

    fn cost(&self, value: &String) -> u64 {
        value.len() as u64
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}

/// Stores any `serde`-compatible payload as JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec<T>(std::marker::PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::NoDataAvailable(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::DecodeFailed(e.to_string()))
    }

    fn cost(&self, value: &T) -> u64 {
        serde_json::to_vec(value).map(|b| b.len() as u64).unwrap_or(0)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
