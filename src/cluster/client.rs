//! Boundary to the coordinator layer of a replicated cache deployment.

use async_trait::async_trait;

use super::types::{PrimaryInfo, ReplicaInfo};
use crate::probe::ProbeError;

/// One coordinator node (a sentinel-style monitor) that tracks the primary and
/// replicas of a named service.
///
/// Implementations map transport failures to
/// [`ErrorKind::ConnectionFailure`](crate::probe::ErrorKind::ConnectionFailure)
/// so unreachable nodes are counted correctly.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// `host:port` of the coordinator itself
    fn address(&self) -> &str;

    async fn ping(&self) -> Result<(), ProbeError>;

    /// Primary this coordinator currently believes in; `None` when it tracks no
    /// such service
    async fn primary(&self, service_name: &str) -> Result<Option<PrimaryInfo>, ProbeError>;

    async fn replicas(&self, service_name: &str) -> Result<Vec<ReplicaInfo>, ProbeError>;
}
