//! The embedded single node broker
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, LazyLock, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use bon::bon;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use super::record::Record;

/// Clusters reachable by their bootstrap address
static REGISTRY: LazyLock<Mutex<HashMap<String, Weak<ClusterInner>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));
static NEXT_CLUSTER_ID: AtomicU64 = AtomicU64::new(0);

const ADDRESS_SCHEME: &str = "embedded://";

/// An in-process, single node broker holding named, partitioned topics in memory.
///
/// The cluster is reachable by clients through the address returned from
/// [EmbeddedCluster::bootstrap_servers] for as long as a handle to it exists, or until
/// [EmbeddedCluster::stop] is called. Handles are cheap to clone and share the same broker.
///
/// # Example
/// ```rust
/// use runnel::embedded::EmbeddedCluster;
///
/// let cluster = EmbeddedCluster::builder()
///     .auto_create_topics(true)
///     .start();
/// cluster.create_topic("inputTopic").unwrap();
/// assert_eq!(cluster.topics(), vec!["inputTopic".to_string()]);
/// assert!(cluster.bootstrap_servers().starts_with("embedded://"));
/// ```
#[derive(Clone)]
pub struct EmbeddedCluster {
    inner: Arc<ClusterInner>,
}

struct ClusterInner {
    address: String,
    auto_create_topics: bool,
    default_partitions: i32,
    state: Mutex<ClusterState>,
    // notified whenever records are appended or the cluster stops
    appended: Condvar,
}

struct ClusterState {
    running: bool,
    topics: IndexMap<String, Vec<PartitionLog>>,
    // committed offsets by (group, topic, partition)
    committed: HashMap<(String, String, i32), i64>,
}

#[derive(Default)]
struct PartitionLog {
    records: Vec<Record>,
}

impl PartitionLog {
    fn end_offset(&self) -> i64 {
        self.records.len() as i64
    }
}

#[bon]
impl EmbeddedCluster {
    /// Start a new embedded cluster
    #[builder(finish_fn = start)]
    pub fn new(
        /// Create topics on first produce, like a broker with `auto.create.topics.enable`
        #[builder(default)]
        auto_create_topics: bool,
        /// Partition count of automatically created topics
        #[builder(default = 1)]
        default_partitions: i32,
    ) -> Self {
        let id = NEXT_CLUSTER_ID.fetch_add(1, Ordering::Relaxed);
        let address = format!("{ADDRESS_SCHEME}{id}");
        let inner = Arc::new(ClusterInner {
            address: address.clone(),
            auto_create_topics,
            default_partitions,
            state: Mutex::new(ClusterState {
                running: true,
                topics: IndexMap::new(),
                committed: HashMap::new(),
            }),
            appended: Condvar::new(),
        });
        lock_registry().insert(address.clone(), Arc::downgrade(&inner));
        info!(%address, "Started embedded cluster");
        Self { inner }
    }
}

impl EmbeddedCluster {
    /// Start a new embedded cluster with default settings
    pub fn start() -> Self {
        Self::builder().start()
    }

    /// Address under which clients can reach this cluster
    pub fn bootstrap_servers(&self) -> &str {
        &self.inner.address
    }

    /// Create a topic with a single partition
    pub fn create_topic(&self, name: &str) -> Result<(), BrokerError> {
        self.create_topic_with_partitions(name, 1)
    }

    /// Create a topic with the given number of partitions
    pub fn create_topic_with_partitions(
        &self,
        name: &str,
        partitions: i32,
    ) -> Result<(), BrokerError> {
        let mut state = self.inner.lock_running()?;
        if state.topics.contains_key(name) {
            return Err(BrokerError::TopicExists(name.to_string()));
        }
        create_topic(&mut state, name, partitions)
    }

    /// Delete a topic together with all its records and committed offsets
    pub fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        let mut state = self.inner.lock_running()?;
        if state.topics.shift_remove(name).is_none() {
            return Err(BrokerError::UnknownTopic(name.to_string()));
        }
        state.committed.retain(|(_, topic, _), _| topic != name);
        info!(topic = name, "Deleted topic");
        Ok(())
    }

    /// Names of all topics in order of creation
    pub fn topics(&self) -> Vec<String> {
        self.inner.lock_state().topics.keys().cloned().collect()
    }

    /// Number of partitions of a topic
    pub fn partitions(&self, topic: &str) -> Result<i32, BrokerError> {
        let state = self.inner.lock_running()?;
        Ok(get_partitions(&state, topic)?.len() as i32)
    }

    /// Offset the next record appended to the partition will get
    pub fn log_end_offset(&self, topic: &str, partition: i32) -> Result<i64, BrokerError> {
        let state = self.inner.lock_running()?;
        Ok(get_partition(&state, topic, partition)?.end_offset())
    }

    /// Stop this cluster. Clients still connected will receive errors on their next request
    /// and new clients can no longer reach the cluster.
    pub fn stop(&self) {
        self.inner.lock_state().running = false;
        self.inner.appended.notify_all();
        lock_registry().remove(&self.inner.address);
        info!(address = %self.inner.address, "Stopped embedded cluster");
    }

    /// Find a running cluster by its bootstrap address. A comma separated list of addresses is
    /// accepted and the first reachable one is used.
    pub(crate) fn resolve(bootstrap_servers: &str) -> Result<EmbeddedCluster, BrokerError> {
        let registry = lock_registry();
        bootstrap_servers
            .split(',')
            .map(str::trim)
            .find_map(|address| registry.get(address).and_then(Weak::upgrade))
            .map(|inner| EmbeddedCluster { inner })
            .ok_or_else(|| BrokerError::Unreachable(bootstrap_servers.to_string()))
    }

    /// Append a record to a partition, returning its offset
    pub(crate) fn append(
        &self,
        topic: &str,
        partition: i32,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
        timestamp: Option<i64>,
    ) -> Result<i64, BrokerError> {
        let mut state = self.inner.lock_running()?;
        self.inner.ensure_topic(&mut state, topic)?;
        let log = get_partition_mut(&mut state, topic, partition)?;
        let offset = log.end_offset();
        log.records.push(Record {
            topic: topic.to_string(),
            partition,
            offset,
            timestamp: timestamp.unwrap_or_else(now_millis),
            key,
            value,
        });
        drop(state);
        self.inner.appended.notify_all();
        debug!(topic, partition, offset, "Appended record");
        Ok(offset)
    }

    /// Partition count of a topic, creating the topic if automatic creation is enabled
    pub(crate) fn partitions_for(&self, topic: &str) -> Result<i32, BrokerError> {
        let mut state = self.inner.lock_running()?;
        self.inner.ensure_topic(&mut state, topic)?;
        Ok(get_partitions(&state, topic)?.len() as i32)
    }

    /// Fetch up to `max` records starting at the given positions.
    /// If no position has any records available, block until records are appended or the timeout
    /// elapsed. Returns an empty Vec on timeout.
    pub(crate) fn fetch(
        &self,
        positions: &[(String, i32, i64)],
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<Record>, BrokerError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock_running()?;
        loop {
            let mut records = Vec::new();
            for (topic, partition, offset) in positions {
                let remaining = max.saturating_sub(records.len());
                if remaining == 0 {
                    break;
                }
                let log = get_partition(&state, topic, *partition)?;
                let start = (*offset).clamp(0, log.end_offset()) as usize;
                records.extend(log.records[start..].iter().take(remaining).cloned());
            }
            if !records.is_empty() {
                return Ok(records);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(records);
            }
            state = self
                .inner
                .appended
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            if !state.running {
                return Err(BrokerError::Unreachable(self.inner.address.clone()));
            }
        }
    }

    /// Offset committed by a consumer group for a partition
    pub(crate) fn committed(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
    ) -> Result<Option<i64>, BrokerError> {
        let state = self.inner.lock_running()?;
        get_partition(&state, topic, partition)?;
        Ok(state
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied())
    }

    /// Commit offsets for a consumer group. The committed offset is the offset of the next record
    /// the group should read.
    pub(crate) fn commit(
        &self,
        group: &str,
        offsets: impl IntoIterator<Item = (String, i32, i64)>,
    ) -> Result<(), BrokerError> {
        let mut state = self.inner.lock_running()?;
        for (topic, partition, offset) in offsets {
            get_partition(&state, &topic, partition)?;
            debug!(group, %topic, partition, offset, "Committed offset");
            state
                .committed
                .insert((group.to_string(), topic, partition), offset);
        }
        Ok(())
    }
}

impl ClusterInner {
    fn lock_state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_running(&self) -> Result<MutexGuard<'_, ClusterState>, BrokerError> {
        let state = self.lock_state();
        if state.running {
            Ok(state)
        } else {
            Err(BrokerError::Unreachable(self.address.clone()))
        }
    }

    fn ensure_topic(&self, state: &mut ClusterState, topic: &str) -> Result<(), BrokerError> {
        if state.topics.contains_key(topic) {
            Ok(())
        } else if self.auto_create_topics {
            create_topic(state, topic, self.default_partitions)
        } else {
            Err(BrokerError::UnknownTopic(topic.to_string()))
        }
    }
}

impl Drop for ClusterInner {
    fn drop(&mut self) {
        let mut registry = lock_registry();
        // the address may already be gone if the cluster was stopped
        if registry
            .get(&self.address)
            .is_some_and(|x| x.strong_count() == 0)
        {
            registry.remove(&self.address);
        }
    }
}

fn lock_registry() -> MutexGuard<'static, HashMap<String, Weak<ClusterInner>>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

fn create_topic(state: &mut ClusterState, name: &str, partitions: i32) -> Result<(), BrokerError> {
    if partitions < 1 {
        return Err(BrokerError::InvalidPartitions {
            topic: name.to_string(),
            partitions,
        });
    }
    let logs = (0..partitions).map(|_| PartitionLog::default()).collect();
    state.topics.insert(name.to_string(), logs);
    info!(topic = name, partitions, "Created topic");
    Ok(())
}

fn get_partitions<'a>(
    state: &'a ClusterState,
    topic: &str,
) -> Result<&'a Vec<PartitionLog>, BrokerError> {
    state
        .topics
        .get(topic)
        .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))
}

fn get_partition<'a>(
    state: &'a ClusterState,
    topic: &str,
    partition: i32,
) -> Result<&'a PartitionLog, BrokerError> {
    let unknown = || BrokerError::UnknownPartition {
        topic: topic.to_string(),
        partition,
    };
    let index = usize::try_from(partition).map_err(|_| unknown())?;
    get_partitions(state, topic)?.get(index).ok_or_else(unknown)
}

fn get_partition_mut<'a>(
    state: &'a mut ClusterState,
    topic: &str,
    partition: i32,
) -> Result<&'a mut PartitionLog, BrokerError> {
    let unknown = || BrokerError::UnknownPartition {
        topic: topic.to_string(),
        partition,
    };
    let index = usize::try_from(partition).map_err(|_| unknown())?;
    state
        .topics
        .get_mut(topic)
        .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?
        .get_mut(index)
        .ok_or_else(unknown)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|x| x.as_millis() as i64)
        .unwrap_or_default()
}

/// Errors returned by the embedded broker
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The topic does not exist
    #[error("Unknown topic '{0}'")]
    UnknownTopic(String),
    /// A topic with this name already exists
    #[error("Topic '{0}' already exists")]
    TopicExists(String),
    /// Topics need at least one partition
    #[error("Invalid partition count {partitions} for topic '{topic}'")]
    InvalidPartitions {
        /// Topic which was to be created
        topic: String,
        /// Requested partition count
        partitions: i32,
    },
    /// The topic exists but does not have this partition
    #[error("Topic '{topic}' has no partition {partition}")]
    UnknownPartition {
        /// Requested topic
        topic: String,
        /// Requested partition
        partition: i32,
    },
    /// No running cluster is registered under this address
    #[error("No embedded cluster reachable at '{0}'")]
    Unreachable(String),
}
