//! Distribution group linking protocol.
//!
//! Responsibilities:
//! - Linking a master and N clients (five gated steps, fail-fast)
//! - Best-effort teardown that never short-circuits
//! - Removing a single client from a running group
//! - Verifying a server's clients when its distribution info changes
//!
//! A failed link is not rolled back: devices touched by earlier steps keep
//! their new settings until the caller unlinks them.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use super::group_id::GroupId;
use super::registry::{DistributionGroup, GroupMember, GroupRegistry, MemberConflict};
use crate::api::commands;
use crate::api::traits::McTransport;
use crate::api::types::{DistributionInfo, GroupRole};
use crate::config::LinkConfig;
use crate::error::MusicCastResult;
use crate::protocol_constants::{SERVER_ACTION_ADD, SERVER_ACTION_REMOVE};

/// Ordered steps of [`GroupLinker::link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStep {
    Compatibility,
    PrepareClients,
    PrepareMaster,
    StartDistribution,
    NameGroup,
}

impl fmt::Display for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compatibility => "compatibility check",
            Self::PrepareClients => "prepare clients",
            Self::PrepareMaster => "prepare master",
            Self::StartDistribution => "start distribution",
            Self::NameGroup => "name group",
        };
        f.write_str(s)
    }
}

/// Why a link operation stopped.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("linking failed at {step}: {reason}")]
    Failed { step: LinkStep, reason: String },

    #[error("no clients to link")]
    NoClients,

    /// The master or a client is already in a tracked group.
    #[error("cannot link: {0}")]
    MemberBusy(#[from] MemberConflict),
}

impl LinkError {
    fn at(step: LinkStep, reason: impl fmt::Display) -> Self {
        Self::Failed {
            step,
            reason: reason.to_string(),
        }
    }

    /// Returns the failed step, if the failure happened inside one.
    #[must_use]
    pub fn step(&self) -> Option<LinkStep> {
        match self {
            Self::Failed { step, .. } => Some(*step),
            Self::NoClients | Self::MemberBusy(_) => None,
        }
    }
}

/// Outcome of [`GroupLinker::reconcile_server`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCheck {
    /// Clients that failed verification and were removed.
    pub removed: Vec<String>,
    /// True when no client remained and the group was dissolved.
    pub dissolved: bool,
}

/// Drives the vendor distribution protocol.
pub struct GroupLinker {
    transport: Arc<dyn McTransport>,
    registry: Arc<GroupRegistry>,
    config: LinkConfig,
}

impl GroupLinker {
    pub fn new(
        transport: Arc<dyn McTransport>,
        registry: Arc<GroupRegistry>,
        config: LinkConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    fn transport(&self) -> &dyn McTransport {
        self.transport.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Link
    // ─────────────────────────────────────────────────────────────────────────────

    /// Joins `clients` to `master` as one synchronized group.
    ///
    /// On success the group is registered and returned. On failure nothing is
    /// registered and the error names the step that failed. Devices already
    /// in a tracked group are refused before any request is sent.
    pub async fn link(
        &self,
        master: &str,
        clients: &[String],
    ) -> Result<DistributionGroup, LinkError> {
        if clients.is_empty() {
            return Err(LinkError::NoClients);
        }
        self.registry
            .check_free(std::iter::once(master).chain(clients.iter().map(String::as_str)), None)?;

        self.check_compatibility(master, clients)
            .await
            .map_err(|reason| LinkError::at(LinkStep::Compatibility, reason))?;

        let zone = self.config.zone.clone();
        let group = DistributionGroup {
            id: GroupId::generate(),
            master: GroupMember::new(master, zone.clone()),
            clients: clients
                .iter()
                .map(|c| GroupMember::new(c.as_str(), zone.clone()))
                .collect(),
            name: self.config.group_name.clone(),
        };
        log::info!(
            "[Link] Linking group {} (master {}, clients {:?})",
            group.id,
            master,
            clients
        );

        self.prepare_clients(&group)
            .await
            .map_err(|reason| LinkError::at(LinkStep::PrepareClients, reason))?;

        commands::set_server_info(
            self.transport(),
            master,
            group.id,
            SERVER_ACTION_ADD,
            &group.master.zone,
            &group.client_addresses(),
        )
        .await
        .map_err(|e| LinkError::at(LinkStep::PrepareMaster, e))?;

        commands::start_distribution(self.transport(), master, self.registry.len())
            .await
            .map_err(|e| LinkError::at(LinkStep::StartDistribution, e))?;

        commands::set_group_name(self.transport(), master, &group.name)
            .await
            .map_err(|e| LinkError::at(LinkStep::NameGroup, e))?;

        if let Err(conflict) = self.registry.insert(group.clone()) {
            log::warn!("[Link] Group {} linked but not tracked: {}", group.id, conflict);
            return Err(conflict.into());
        }
        log::info!("[Link] Group {} linked", group.id);
        Ok(group)
    }

    /// Fails unless every client's version is accepted by the master.
    async fn check_compatibility(&self, master: &str, clients: &[String]) -> Result<(), String> {
        let master_features = commands::get_features(self.transport(), master)
            .await
            .map_err(|e| format!("{master}: {e}"))?;
        let dist = master_features
            .distribution
            .ok_or_else(|| format!("{master} does not support distribution"))?;

        let checks = clients.iter().map(|client| async move {
            let features = commands::get_features(self.transport(), client).await;
            (client, features)
        });
        let results = join_all(checks).await;

        let mut incompatible = Vec::new();
        for (client, features) in results {
            let features = features.map_err(|e| format!("{client}: {e}"))?;
            match features.distribution {
                Some(d) if dist.accepts_client(d.version_number()) => {
                    log::debug!("[Link] {} version {} is compatible", client, d.version_number());
                }
                Some(d) => incompatible.push(format!("{client} (version {})", d.version_number())),
                None => incompatible.push(format!("{client} (no distribution support)")),
            }
        }

        if incompatible.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "master {} accepts versions {:?}, incompatible: {}",
                master,
                dist.compatible_client,
                incompatible.join(", ")
            ))
        }
    }

    /// Powers on, switches and registers every client. All are attempted.
    async fn prepare_clients(&self, group: &DistributionGroup) -> Result<(), String> {
        let mut failures = Vec::new();
        for client in &group.clients {
            if let Err(e) = self.prepare_client(group, client).await {
                log::warn!("[Link] Failed to prepare client {}: {}", client.address, e);
                failures.push(format!("{}: {}", client.address, e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }

    async fn prepare_client(
        &self,
        group: &DistributionGroup,
        client: &GroupMember,
    ) -> MusicCastResult<()> {
        let status = commands::get_status(self.transport(), &client.address, &client.zone).await?;

        let field = |key: &str| status.get(key).and_then(|v| v.as_str()).unwrap_or_default();
        if field("power") != "on" {
            commands::set_power(self.transport(), &client.address, &client.zone, true).await?;
        }
        if field("input") != self.config.link_input {
            commands::set_input(
                self.transport(),
                &client.address,
                &client.zone,
                &self.config.link_input,
            )
            .await?;
        }
        commands::set_client_info(
            self.transport(),
            &client.address,
            Some(group.id),
            &group.master.address,
            &client.zone,
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────────────

    /// Dissolves a group. Every sub-step runs; the result is their AND.
    ///
    /// The group leaves the registry whatever the outcome.
    pub async fn unlink(&self, group: &DistributionGroup) -> bool {
        log::info!("[Link] Unlinking group {}", group.id);
        let master = group.master.address.as_str();
        let mut success = true;

        for client in &group.clients {
            success &= report(
                "clear client",
                &client.address,
                commands::set_client_info(self.transport(), &client.address, None, master, &client.zone)
                    .await,
            );
        }
        success &= report(
            "clear server info",
            master,
            commands::clear_server_info(self.transport(), master).await,
        );
        success &= report(
            "stop distribution",
            master,
            commands::stop_distribution(self.transport(), master).await,
        );
        success &= report(
            "clear group name",
            master,
            commands::set_group_name(self.transport(), master, "").await,
        );

        self.registry.remove(&group.id);
        if success {
            log::info!("[Link] Group {} unlinked", group.id);
        } else {
            log::warn!("[Link] Group {} unlinked with errors", group.id);
        }
        success
    }

    /// Detaches one client and tells the master to drop it.
    pub async fn remove_client(&self, group: &DistributionGroup, client: &str) -> bool {
        let master = &group.master;
        let zone = group
            .clients
            .iter()
            .find(|c| c.address == client)
            .map_or(self.config.zone.as_str(), |c| c.zone.as_str());
        log::info!("[Link] Removing client {} from group {}", client, group.id);

        let mut success = report(
            "clear client",
            client,
            commands::set_client_info(self.transport(), client, None, &master.address, zone).await,
        );
        success &= report(
            "remove client from server",
            &master.address,
            commands::set_server_info(
                self.transport(),
                &master.address,
                group.id,
                SERVER_ACTION_REMOVE,
                &master.zone,
                &[client.to_string()],
            )
            .await,
        );

        self.registry.remove_client(&group.id, client);
        success
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Out-of-band reconciliation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verifies the clients of a group this controller formed, once its master
    /// reports a distribution change.
    ///
    /// Clients that no longer follow the group are removed; when none remain
    /// the group is dissolved. Devices that are not serving, and groups formed
    /// elsewhere (another controller, the vendor app), are left alone.
    pub async fn reconcile_server(&self, master: &str, info: &DistributionInfo) -> ServerCheck {
        let mut check = ServerCheck::default();
        if !info.is_server() {
            return check;
        }

        let group_id = info.group_id();
        let Some(group) = self.registry.get(&group_id) else {
            log::debug!("[Link] Group {} on {} is managed elsewhere, skipping", group_id, master);
            return check;
        };

        for client in &group.clients {
            if let Err(reason) = self.verify_client(&client.address, &client.zone, group_id).await {
                log::warn!(
                    "[Link] Client {} of group {} failed verification: {}",
                    client.address,
                    group_id,
                    reason
                );
                self.remove_client(&group, &client.address).await;
                check.removed.push(client.address.clone());
            }
        }

        if check.removed.len() == group.clients.len() {
            log::info!("[Link] No clients left in group {}, dissolving", group_id);
            let remaining = self.registry.get(&group_id).unwrap_or(DistributionGroup {
                clients: Vec::new(),
                ..group
            });
            self.unlink(&remaining).await;
            check.dissolved = true;
        }
        check
    }

    /// Checks that a client follows `group_id` on the link input.
    async fn verify_client(&self, client: &str, zone: &str, group_id: GroupId) -> Result<(), String> {
        let dist = commands::get_distribution_info(self.transport(), client)
            .await
            .map_err(|e| e.to_string())?;
        if dist.role != GroupRole::Client {
            return Err(format!("role is {:?}", dist.role));
        }
        if dist.group_id() != group_id {
            return Err(format!("follows group {}", dist.group_id()));
        }

        let status = commands::get_status(self.transport(), client, zone)
            .await
            .map_err(|e| e.to_string())?;
        let input = status.get("input").and_then(|v| v.as_str()).unwrap_or_default();
        if input != self.config.link_input {
            return Err(format!("input is {input:?}"));
        }
        Ok(())
    }
}

/// Logs a failed best-effort sub-step and returns whether it succeeded.
fn report(action: &str, address: &str, result: MusicCastResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[Link] {} on {} failed: {}", action, address, e);
            false
        }
    }
}
