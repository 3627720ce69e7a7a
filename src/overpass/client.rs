//! The caching, retrying façade over [`QueryTransport`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::ElementCache;
use crate::config::Config;
use crate::error::{OverpassError, OverpassResult};
use crate::model::element::{Node, Relation, RelationMember, Tags, Way};
use crate::overpass::query::{self, AreaFilter};
use crate::overpass::transport::QueryTransport;

/// Relation/way member resolution never recurses past this depth: a relation
/// may reference ways, a way may reference nodes, and that's where it stops.
pub const MAX_RECURSION_DEPTH: u32 = 2;

pub struct OverpassClient {
    transport: Arc<dyn QueryTransport>,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
    pub relations: Vec<Relation>,
    pub error: Option<String>,
}

impl OverpassClient {
    pub fn new(transport: Arc<dyn QueryTransport>, config: &Config) -> Self {
        Self {
            transport,
            max_retries: config.overpass_api.max_retries,
            retry_delay: Duration::from_secs(config.overpass_api.retry_delay_secs),
        }
    }

    /// Runs `query` through the transport, retrying transient failures up to
    /// `max_retries` times. Never propagates a transport error to the caller:
    /// on total exhaustion it returns an empty result with `error` set, the
    /// same degrade-gracefully contract the retrieval layer follows.
    async fn execute_with_retry(&self, query: &str) -> (Option<Value>, Option<String>) {
        let mut attempt = 0;
        loop {
            match self.transport.execute(query).await {
                Ok(value) => return (Some(value), None),
                Err(err) => {
                    attempt += 1;
                    warn!(attempt, %err, "overpass query failed");
                    if attempt > self.max_retries {
                        return (None, Some(err.to_string()));
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Fetches every `power=plant` or `power=generator` element within the
    /// given area filter.
    pub async fn get_power_elements(
        &self,
        power_value: &str,
        filter: &AreaFilter,
    ) -> OverpassResult<FetchOutcome> {
        let q = query::power_elements_query(power_value, filter)?;
        let (value, error) = self.execute_with_retry(&q).await;
        let Some(value) = value else {
            return Ok(FetchOutcome {
                error,
                ..Default::default()
            });
        };
        parse_elements(&value)
    }

    pub async fn count_power_elements(
        &self,
        power_value: &str,
        filter: &AreaFilter,
    ) -> OverpassResult<u64> {
        let q = query::count_query(power_value, filter)?;
        let (value, error) = self.execute_with_retry(&q).await;
        let Some(value) = value else {
            return Err(OverpassError::Transport(
                error.unwrap_or_else(|| "unknown transport failure".to_string()),
            ));
        };
        extract_count(&value)
    }

    /// Resolves the node/way members an uncached way or relation references,
    /// populating `cache` with whatever comes back. `depth` tracks how many
    /// recursive member-resolution hops have already happened; callers start
    /// at 0 and this never goes past [`MAX_RECURSION_DEPTH`].
    pub async fn resolve_members(
        &self,
        ids: &[i64],
        element_type: &str,
        cache: &mut ElementCache,
        depth: u32,
    ) -> OverpassResult<()> {
        if depth >= MAX_RECURSION_DEPTH || ids.is_empty() {
            return Ok(());
        }
        let missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|&id| match element_type {
                "node" => cache.get_node(id).is_none(),
                "way" => cache.get_way(id).is_none(),
                _ => cache.get_relation(id).is_none(),
            })
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let q = query::ids_query(element_type, &missing, true)?;
        let (value, error) = self.execute_with_retry(&q).await;
        let Some(value) = value else {
            warn!(error, "member resolution failed, proceeding without them");
            return Ok(());
        };
        let outcome = parse_elements(&value)?;
        cache.store_nodes(outcome.nodes);
        cache.store_ways(outcome.ways);
        cache.store_relations(outcome.relations);
        Ok(())
    }

    /// True if `way`'s node members are all present in `cache` (no further
    /// network round-trip needed to compute its geometry).
    pub fn way_fully_cached(way: &Way, cache: &ElementCache) -> bool {
        way.nodes.iter().all(|id| cache.get_node(*id).is_some())
    }

    /// True if `relation`'s node and way members are all present in `cache`.
    /// Nested relation members are never required to be cached: the source
    /// does not recurse into them either.
    pub fn relation_fully_cached(relation: &Relation, cache: &ElementCache) -> bool {
        relation.members.iter().all(|m| match m.member_type {
            crate::model::element::MemberType::Node => cache.get_node(m.ref_id).is_some(),
            crate::model::element::MemberType::Way => cache.get_way(m.ref_id).is_some(),
            crate::model::element::MemberType::Relation => true,
        })
    }
}

fn extract_count(value: &Value) -> OverpassResult<u64> {
    value
        .get("elements")
        .and_then(|e| e.as_array())
        .and_then(|arr| arr.first())
        .and_then(|e| e.get("tags"))
        .and_then(|tags| tags.get("total"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| OverpassError::InvalidResponse("no count in response".to_string()))
}

fn parse_elements(value: &Value) -> OverpassResult<FetchOutcome> {
    let elements = value
        .get("elements")
        .and_then(|e| e.as_array())
        .ok_or_else(|| OverpassError::InvalidResponse("missing elements array".to_string()))?;

    let mut outcome = FetchOutcome::default();
    for el in elements {
        let kind = el.get("type").and_then(|v| v.as_str()).unwrap_or_default();
        let id = el.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
        let tags: Tags = el
            .get("tags")
            .and_then(|t| t.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        match kind {
            "node" => {
                let lat = el.get("lat").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let lon = el.get("lon").and_then(|v| v.as_f64()).unwrap_or(0.0);
                outcome.nodes.push(Node {
                    id,
                    lat,
                    lon,
                    tags,
                    country: None,
                });
            }
            "way" => {
                let nodes = el
                    .get("nodes")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|n| n.as_i64()).collect())
                    .unwrap_or_default();
                outcome.ways.push(Way {
                    id,
                    nodes,
                    tags,
                    country: None,
                    lat: el.get("center").and_then(|c| c.get("lat")).and_then(|v| v.as_f64()),
                    lon: el.get("center").and_then(|c| c.get("lon")).and_then(|v| v.as_f64()),
                });
            }
            "relation" => {
                let members = el
                    .get("members")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|m| {
                                let member_type = match m.get("type").and_then(|v| v.as_str())? {
                                    "node" => crate::model::element::MemberType::Node,
                                    "way" => crate::model::element::MemberType::Way,
                                    "relation" => crate::model::element::MemberType::Relation,
                                    _ => return None,
                                };
                                Some(RelationMember {
                                    member_type,
                                    ref_id: m.get("ref").and_then(|v| v.as_i64())?,
                                    role: m
                                        .get("role")
                                        .and_then(|v| v.as_str())
                                        .unwrap_or_default()
                                        .to_string(),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                outcome.relations.push(Relation {
                    id,
                    members,
                    tags,
                    country: None,
                    lat: el.get("center").and_then(|c| c.get("lat")).and_then(|v| v.as_f64()),
                    lon: el.get("center").and_then(|c| c.get("lon")).and_then(|v| v.as_f64()),
                });
            }
            other => {
                info!(kind = other, "ignoring unknown element type in response");
            }
        }
    }
    Ok(outcome)
}
