//! Topic administration against the cluster controller.

use rand::seq::SliceRandom;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{error, info};

use crate::connection::DIAL_TIMEOUT;
use crate::wire::{self, Request, Response, TopicSpec};
use crate::{Error, Result};

/// Topic creation parameters. Optional entries are only sent when set, so
/// the cluster default applies otherwise.
#[derive(Debug, Clone)]
pub struct TopicSettings {
    pub name: String,
    pub partitions: u32,

    /// Copies of each partition. Too low risks losing the only replica of
    /// a failed node; 3 is the usual choice.
    pub replication_factor: u16,

    /// Writes must be synchronously acknowledged by this many replicas
    /// before they count as committed.
    pub min_insync_replicas: Option<u32>,

    /// Allow electing a leader from outside the in-sync set. Recovers
    /// availability at the cost of losing the unsynced tail.
    pub unclean_leader_election: Option<bool>,

    /// Retention time for the topic's segments.
    pub retention: Option<Duration>,

    /// Retention size per partition.
    pub retention_bytes: Option<i64>,

    /// Stamp records with broker append time instead of producer time.
    pub log_append_time: bool,
}

impl TopicSettings {
    pub fn new(name: impl Into<String>, partitions: u32, replication_factor: u16) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
            min_insync_replicas: None,
            unclean_leader_election: None,
            retention: None,
            retention_bytes: None,
            log_append_time: false,
        }
    }

    fn config_entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::with_capacity(3);

        if let Some(n) = self.min_insync_replicas {
            entries.push(("min.insync.replicas".into(), n.to_string()));
        }
        if let Some(enable) = self.unclean_leader_election {
            entries.push(("unclean.leader.election.enable".into(), enable.to_string()));
        }
        if let Some(retention) = self.retention {
            entries.push(("retention.ms".into(), retention.as_millis().to_string()));
        }
        if let Some(bytes) = self.retention_bytes {
            entries.push(("retention.bytes".into(), bytes.to_string()));
        }
        if self.log_append_time {
            entries.push(("message.timestamp.type".into(), "LogAppendTime".into()));
        }

        entries
    }
}

/// Create a topic: dial a random seed broker, locate the controller, and
/// issue the creation there. Returns the server-side partition list.
pub async fn create_topic(brokers: &[String], settings: &TopicSettings) -> Result<Vec<u32>> {
    let seed = brokers
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| Error::ConnectionError("empty broker list".into()))?;

    let mut seed_stream = timeout(DIAL_TIMEOUT, TcpStream::connect(seed))
        .await
        .map_err(|_| Error::Timeout(format!("dial seed {seed}")))??;

    wire::write_frame(&mut seed_stream, &Request::FindController).await?;
    let controller = match wire::read_frame::<_, Response>(&mut seed_stream).await? {
        Response::Controller { addr } => addr,
        Response::Error { message } => {
            error!(topic = %settings.name, error = %message, "find controller failed");
            return Err(Error::ServerError(message));
        }
        _ => return Err(Error::InvalidResponse),
    };
    drop(seed_stream);

    let mut ctrl = timeout(DIAL_TIMEOUT, TcpStream::connect(&controller))
        .await
        .map_err(|_| Error::Timeout(format!("dial controller {controller}")))??;

    let spec = TopicSpec {
        name: settings.name.clone(),
        partitions: settings.partitions,
        replication_factor: settings.replication_factor,
        configs: settings.config_entries(),
    };
    wire::write_frame(&mut ctrl, &Request::CreateTopics { topics: vec![spec] }).await?;
    match wire::read_frame::<_, Response>(&mut ctrl).await? {
        Response::TopicsCreated => {}
        Response::Error { message } => {
            error!(topic = %settings.name, error = %message, "create topic failed");
            return Err(Error::ServerError(message));
        }
        _ => return Err(Error::InvalidResponse),
    }

    wire::write_frame(
        &mut ctrl,
        &Request::ReadPartitions {
            topic: settings.name.clone(),
        },
    )
    .await?;
    let partitions = match wire::read_frame::<_, Response>(&mut ctrl).await? {
        Response::Partitions { partitions } => partitions,
        Response::Error { message } => return Err(Error::ServerError(message)),
        _ => return Err(Error::InvalidResponse),
    };

    info!(
        topic = %settings.name,
        partitions = settings.partitions,
        replication = settings.replication_factor,
        "topic created"
    );

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_entries_skip_unset_options() {
        let settings = TopicSettings::new("orders", 8, 3);
        assert!(settings.config_entries().is_empty());
    }

    #[test]
    fn test_config_entries_full_mapping() {
        let mut settings = TopicSettings::new("orders", 8, 3);
        settings.min_insync_replicas = Some(2);
        settings.unclean_leader_election = Some(false);
        settings.retention = Some(Duration::from_secs(3600));
        settings.retention_bytes = Some(1 << 30);
        settings.log_append_time = true;

        let entries = settings.config_entries();
        assert_eq!(
            entries,
            vec![
                ("min.insync.replicas".to_string(), "2".to_string()),
                (
                    "unclean.leader.election.enable".to_string(),
                    "false".to_string()
                ),
                ("retention.ms".to_string(), "3600000".to_string()),
                ("retention.bytes".to_string(), (1i64 << 30).to_string()),
                (
                    "message.timestamp.type".to_string(),
                    "LogAppendTime".to_string()
                ),
            ]
        );
    }
}
