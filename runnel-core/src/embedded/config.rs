//! Client configuration, built with builders or from Kafka style properties
use std::{str::FromStr, time::Duration};

use bon::Builder;
use thiserror::Error;

/// How many acknowledgements the producer requires before a send counts as successful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acks {
    /// Do not wait for any acknowledgement (`acks=0`)
    None,
    /// Wait for the partition leader (`acks=1`)
    Leader,
    /// Wait for all in-sync replicas (`acks=all`)
    #[default]
    All,
}

impl FromStr for Acks {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Acks::None),
            "1" => Ok(Acks::Leader),
            "all" | "-1" => Ok(Acks::All),
            other => Err(invalid("acks", other)),
        }
    }
}

/// Where a consumer starts reading a partition its group has no committed offset for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    /// Start at the first record of the partition
    Earliest,
    /// Start after the last record of the partition
    #[default]
    Latest,
    /// Fail with an error
    None,
}

impl FromStr for OffsetReset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(OffsetReset::Earliest),
            "latest" => Ok(OffsetReset::Latest),
            "none" => Ok(OffsetReset::None),
            other => Err(invalid("auto.offset.reset", other)),
        }
    }
}

/// Configuration of a [Producer](super::Producer)
///
/// # Example
/// ```rust
/// use runnel::embedded::{Acks, ProducerConfig};
///
/// let config = ProducerConfig::builder()
///     .bootstrap_servers("embedded://0")
///     .acks(Acks::All)
///     .retries(0)
///     .build();
/// assert_eq!(config.client_id, None);
/// ```
///
/// `bootstrap_servers` is required
/// ```compile_fail
/// use runnel::embedded::ProducerConfig;
///
/// let config = ProducerConfig::builder().retries(0).build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ProducerConfig {
    /// Address of the cluster to produce to (`bootstrap.servers`)
    #[builder(into)]
    pub bootstrap_servers: String,
    /// Acknowledgements required for a send (`acks`)
    #[builder(default)]
    pub acks: Acks,
    /// How often a failed send is retried (`retries`)
    #[builder(default = 0)]
    pub retries: u32,
    /// Pause between retries (`retry.backoff.ms`)
    #[builder(default = Duration::from_millis(100))]
    pub retry_backoff: Duration,
    /// Name of the producer in logs (`client.id`)
    #[builder(into)]
    pub client_id: Option<String>,
}

impl ProducerConfig {
    /// Read a producer configuration from Kafka style properties.
    /// Unknown keys are rejected.
    ///
    /// # Example
    /// ```rust
    /// use runnel::embedded::{Acks, ProducerConfig};
    ///
    /// let config = ProducerConfig::from_properties([
    ///     ("bootstrap.servers", "embedded://0"),
    ///     ("acks", "all"),
    ///     ("retries", "0"),
    /// ])
    /// .unwrap();
    /// assert_eq!(config.acks, Acks::All);
    /// ```
    pub fn from_properties<'a>(
        properties: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let mut bootstrap_servers = None;
        let mut config = ProducerConfig::builder().bootstrap_servers("").build();
        for (key, value) in properties {
            match key {
                "bootstrap.servers" => bootstrap_servers = Some(value.to_string()),
                "acks" => config.acks = value.parse()?,
                "retries" => config.retries = parse_number(key, value)?,
                "retry.backoff.ms" => {
                    config.retry_backoff = Duration::from_millis(parse_number(key, value)?)
                }
                "client.id" => config.client_id = Some(value.to_string()),
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        config.bootstrap_servers =
            bootstrap_servers.ok_or(ConfigError::Missing("bootstrap.servers"))?;
        Ok(config)
    }
}

/// Configuration of a [Consumer](super::Consumer)
///
/// `bootstrap_servers` and `group_id` are required
/// ```compile_fail
/// use runnel::embedded::ConsumerConfig;
///
/// let config = ConsumerConfig::builder()
///     .bootstrap_servers("embedded://0")
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ConsumerConfig {
    /// Address of the cluster to consume from (`bootstrap.servers`)
    #[builder(into)]
    pub bootstrap_servers: String,
    /// Consumer group committing offsets (`group.id`)
    #[builder(into)]
    pub group_id: String,
    /// Start position for partitions without a committed offset (`auto.offset.reset`)
    #[builder(default)]
    pub auto_offset_reset: OffsetReset,
    /// Maximum number of records returned by a single poll (`max.poll.records`)
    #[builder(default = 500)]
    pub max_poll_records: usize,
    /// Commit the position after every poll (`enable.auto.commit`)
    #[builder(default = true)]
    pub enable_auto_commit: bool,
    /// Name of the consumer in logs (`client.id`)
    #[builder(into)]
    pub client_id: Option<String>,
}

impl ConsumerConfig {
    /// Read a consumer configuration from Kafka style properties.
    /// Unknown keys are rejected.
    pub fn from_properties<'a>(
        properties: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let mut bootstrap_servers = None;
        let mut group_id = None;
        let mut config = ConsumerConfig::builder()
            .bootstrap_servers("")
            .group_id("")
            .build();
        for (key, value) in properties {
            match key {
                "bootstrap.servers" => bootstrap_servers = Some(value.to_string()),
                "group.id" => group_id = Some(value.to_string()),
                "auto.offset.reset" => config.auto_offset_reset = value.parse()?,
                "max.poll.records" => config.max_poll_records = parse_number(key, value)?,
                "enable.auto.commit" => config.enable_auto_commit = parse_bool(key, value)?,
                "client.id" => config.client_id = Some(value.to_string()),
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        config.bootstrap_servers =
            bootstrap_servers.ok_or(ConfigError::Missing("bootstrap.servers"))?;
        config.group_id = group_id.ok_or(ConfigError::Missing("group.id"))?;
        Ok(config)
    }
}

/// Configuration of a stream processing application reading and writing topics
///
/// # Example
/// ```rust
/// use runnel::embedded::{OffsetReset, StreamsConfig};
///
/// let config = StreamsConfig::builder()
///     .application_id("map-function-lambda-integration-test")
///     .bootstrap_servers("embedded://0")
///     .build();
/// assert_eq!(config.auto_offset_reset, OffsetReset::Earliest);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct StreamsConfig {
    /// Identifies the application, also used as the consumer group (`application.id`)
    #[builder(into)]
    pub application_id: String,
    /// Address of the cluster (`bootstrap.servers`)
    #[builder(into)]
    pub bootstrap_servers: String,
    /// Start position for input partitions the application has not committed yet
    /// (`auto.offset.reset`)
    #[builder(default = OffsetReset::Earliest)]
    pub auto_offset_reset: OffsetReset,
    /// Maximum number of records fetched at once (`max.poll.records`)
    #[builder(default = 500)]
    pub max_poll_records: usize,
}

impl StreamsConfig {
    /// Read a streams configuration from Kafka style properties.
    /// Unknown keys are rejected.
    pub fn from_properties<'a>(
        properties: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let mut application_id = None;
        let mut bootstrap_servers = None;
        let mut config = StreamsConfig::builder()
            .application_id("")
            .bootstrap_servers("")
            .build();
        for (key, value) in properties {
            match key {
                "application.id" => application_id = Some(value.to_string()),
                "bootstrap.servers" => bootstrap_servers = Some(value.to_string()),
                "auto.offset.reset" => config.auto_offset_reset = value.parse()?,
                "max.poll.records" => config.max_poll_records = parse_number(key, value)?,
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        config.application_id = application_id.ok_or(ConfigError::Missing("application.id"))?;
        config.bootstrap_servers =
            bootstrap_servers.ok_or(ConfigError::Missing("bootstrap.servers"))?;
        Ok(config)
    }

    /// Configuration for the consumer reading the application's input topics
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig::builder()
            .bootstrap_servers(self.bootstrap_servers.clone())
            .group_id(self.application_id.clone())
            .auto_offset_reset(self.auto_offset_reset)
            .max_poll_records(self.max_poll_records)
            .enable_auto_commit(false)
            .client_id(format!("{}-consumer", self.application_id))
            .build()
    }

    /// Configuration for the producer writing the application's output topics
    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig::builder()
            .bootstrap_servers(self.bootstrap_servers.clone())
            .client_id(format!("{}-producer", self.application_id))
            .build()
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number<N: FromStr>(key: &str, value: &str) -> Result<N, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(invalid(key, other)),
    }
}

/// Errors in a client configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required property was not given
    #[error("Missing required property '{0}'")]
    Missing(&'static str),
    /// The property is not understood by this client
    #[error("Unknown property '{0}'")]
    UnknownKey(String),
    /// The property value could not be parsed
    #[error("Invalid value '{value}' for property '{key}'")]
    InvalidValue {
        /// Property name
        key: String,
        /// Rejected value
        value: String,
    },
}
