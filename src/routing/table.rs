use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub String);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive slice of the signed 32-bit hash ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRange {
    pub min: i32,
    pub max: i32,
}

impl HashRange {
    pub fn full() -> Self {
        Self {
            min: i32::MIN,
            max: i32::MAX,
        }
    }

    pub fn includes(&self, hash: i32) -> bool {
        self.min <= hash && hash <= self.max
    }

    /// Splits this range into `parts` contiguous ranges; the last one absorbs
    /// the remainder so the union is exactly `self`.
    pub fn split(&self, parts: usize) -> Vec<HashRange> {
        let (min, max) = (self.min as i64, self.max as i64);
        let width = max - min + 1;
        let parts = i64::try_from(parts).unwrap_or(width).clamp(1, width);
        let step = (width / parts).max(1);

        let mut ranges = Vec::new();
        let mut start = min;
        for i in 0..parts {
            if start > max {
                break;
            }
            let end = if i == parts - 1 {
                max
            } else {
                (start + step - 1).min(max)
            };
            ranges.push(HashRange {
                min: start as i32,
                max: end as i32,
            });
            start = end + 1;
        }
        ranges
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaState {
    Active,
    Recovering,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub name: String,
    pub node: String,
    pub state: ReplicaState,
    pub leader: bool,
}

impl Replica {
    pub fn is_live(&self) -> bool {
        self.state == ReplicaState::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub name: ShardId,
    pub range: HashRange,
    pub replicas: Vec<Replica>,
}

impl ShardInfo {
    pub fn live_replicas(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.iter().filter(|replica| replica.is_live())
    }

    /// The live leader, falling back to any live replica.
    pub fn preferred_replica(&self) -> Option<&Replica> {
        self.live_replicas()
            .find(|replica| replica.leader)
            .or_else(|| self.live_replicas().next())
    }
}

/// Snapshot of a collection's published shard layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    pub collection: String,
    pub shards: Vec<ShardInfo>,
    pub version: u64,
}

impl RoutingTable {
    /// Lays out `shard_count` shards over the full hash ring, placing replicas
    /// round-robin over `nodes` starting at the shard's own offset.
    pub fn with_even_ranges(
        collection: &str,
        shard_count: usize,
        replicas_per_shard: usize,
        nodes: &[String],
    ) -> Self {
        let shards = HashRange::full()
            .split(shard_count)
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let replicas = if nodes.is_empty() {
                    Vec::new()
                } else {
                    (0..replicas_per_shard.max(1))
                        .map(|r| Replica {
                            name: format!("{}_shard{}_replica_n{}", collection, i + 1, r + 1),
                            node: nodes[(i + r) % nodes.len()].clone(),
                            state: ReplicaState::Active,
                            leader: r == 0,
                        })
                        .collect()
                };
                ShardInfo {
                    name: ShardId(format!("shard{}", i + 1)),
                    range,
                    replicas,
                }
            })
            .collect();

        Self {
            collection: collection.to_string(),
            shards,
            version: 1,
        }
    }

    pub fn shard(&self, name: &ShardId) -> Option<&ShardInfo> {
        self.shards.iter().find(|shard| &shard.name == name)
    }

    pub fn shard_for_hash(&self, hash: i32) -> Option<&ShardInfo> {
        self.shards.iter().find(|shard| shard.range.includes(hash))
    }

    pub fn live_replicas(&self) -> Vec<&Replica> {
        self.shards
            .iter()
            .flat_map(|shard| shard.live_replicas())
            .collect()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
