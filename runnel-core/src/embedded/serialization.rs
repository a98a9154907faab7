//! Conversion between typed record keys and values and the bytes stored by the broker
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Turns values into bytes before they are written to a topic
pub trait Serializer {
    /// Type this serializer accepts
    type Input;

    /// Serialize a value destined for the given topic
    fn serialize(&self, topic: &str, data: &Self::Input) -> Result<Vec<u8>, SerdeError>;
}

/// Turns bytes read from a topic back into values
pub trait Deserializer {
    /// Type this deserializer produces
    type Output;

    /// Deserialize bytes read from the given topic
    fn deserialize(&self, topic: &str, data: &[u8]) -> Result<Self::Output, SerdeError>;
}

/// UTF-8 encoded strings
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerde;

impl Serializer for StringSerde {
    type Input = String;

    fn serialize(&self, _topic: &str, data: &String) -> Result<Vec<u8>, SerdeError> {
        Ok(data.as_bytes().to_vec())
    }
}

impl Deserializer for StringSerde {
    type Output = String;

    fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<String, SerdeError> {
        Ok(String::from_utf8(data.to_vec())?)
    }
}

/// Raw bytes, passed through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerde;

impl Serializer for BytesSerde {
    type Input = Vec<u8>;

    fn serialize(&self, _topic: &str, data: &Vec<u8>) -> Result<Vec<u8>, SerdeError> {
        Ok(data.clone())
    }
}

impl Deserializer for BytesSerde {
    type Output = Vec<u8>;

    fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<Vec<u8>, SerdeError> {
        Ok(data.to_vec())
    }
}

/// Any `serde` type, encoded as MessagePack
pub struct MsgPackSerde<T>(PhantomData<fn() -> T>);

impl<T> MsgPackSerde<T> {
    /// Create a serde for values of type `T`
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for MsgPackSerde<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MsgPackSerde<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Serializer for MsgPackSerde<T>
where
    T: Serialize,
{
    type Input = T;

    fn serialize(&self, _topic: &str, data: &T) -> Result<Vec<u8>, SerdeError> {
        Ok(rmp_serde::to_vec(data)?)
    }
}

impl<T> Deserializer for MsgPackSerde<T>
where
    T: DeserializeOwned,
{
    type Output = T;

    fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<T, SerdeError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

/// Errors when converting between values and bytes
#[derive(Debug, Error)]
pub enum SerdeError {
    /// The bytes are not valid UTF-8
    #[error("Invalid UTF-8 data")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// MessagePack encoding failed
    #[error("Error encoding MessagePack")]
    Encode(#[from] rmp_serde::encode::Error),
    /// MessagePack decoding failed
    #[error("Error decoding MessagePack")]
    Decode(#[from] rmp_serde::decode::Error),
}
