use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::checksum;
use crate::client::{RemoteClient, RemotePinIdentity};
use crate::error::Result;
use crate::upload::{self, UploadFile};

const SYNTHESIZED_NAME_PREFIX: &str = "pinsync";

/// The desired state of one pin: which local files, under what display name,
/// with which CID encoding. Path order is significant: it fixes the
/// checksum order.
#[derive(Debug, Clone)]
pub struct PinInputSet {
    pub paths: Vec<PathBuf>,
    pub name: Option<String>,
    pub cid_version: u8,
}

/// The persisted record for one pin: the remote identity last observed plus
/// the checksum of the inputs last applied. Owned exclusively by the
/// lifecycle operations below; nothing else mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinResourceState {
    pub id: String,
    pub cid: String,
    pub name: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    NoChange,
    /// The content changed. Pins are immutable once created, so the change
    /// cannot be applied in place: the pin must be destroyed and recreated.
    ForcedReplace,
}

#[derive(Debug, Clone)]
pub struct PlanDiff {
    /// Fingerprint of the proposed input set.
    pub checksum: String,
    pub outcome: PlanOutcome,
}

/// Byte comparison of fingerprints is the sole drift signal; file metadata
/// never participates.
pub fn diff_outcome(proposed: &str, stored: &str) -> PlanOutcome {
    if proposed == stored {
        PlanOutcome::NoChange
    } else {
        PlanOutcome::ForcedReplace
    }
}

/// Recompute the fingerprint of the proposed inputs and compare it against
/// the stored one. Performs no network I/O, so a plan can run fully
/// offline.
pub fn plan_diff(desired: &PinInputSet, stored_checksum: &str) -> Result<PlanDiff> {
    let proposed = checksum::fingerprint(&desired.paths)?;
    let outcome = diff_outcome(&proposed, stored_checksum);
    Ok(PlanDiff {
        checksum: proposed,
        outcome,
    })
}

/// Lifecycle operations for one pin resource. Borrows the process-wide
/// client; each instance's operations are invoked strictly one at a time.
#[derive(Debug)]
pub struct PinResource<'a> {
    client: &'a RemoteClient,
}

impl<'a> PinResource<'a> {
    pub fn new(client: &'a RemoteClient) -> Self {
        Self { client }
    }

    /// Absent -> Present. The fingerprint is computed before any network
    /// I/O, so unreadable inputs fail the transition without touching the
    /// service.
    pub fn create(&self, desired: &PinInputSet) -> Result<PinResourceState> {
        let checksum = checksum::fingerprint(&desired.paths)?;
        let name = declared_name(desired).unwrap_or_else(synthesized_name);
        let identity = self
            .upload(desired, &name)
            .map_err(|e| e.context(format!("create pin '{name}'")))?;
        tracing::info!(id = %identity.id, cid = %identity.cid, "pin created");
        Ok(record(identity, checksum))
    }

    /// Present -> Present. Overwrites id/cid/name with freshly fetched
    /// values. The stored checksum is reconciliation-local information the
    /// service does not report, so it is carried over untouched. A remote
    /// object that is gone surfaces as an error.
    pub fn read(&self, state: &PinResourceState) -> Result<PinResourceState> {
        let identity = self
            .client
            .fetch_pin(&state.id)
            .map_err(|e| e.context(format!("read pin '{}'", state.id)))?;
        Ok(record(identity, state.checksum.clone()))
    }

    /// Present -> Present, only reached after plan_diff flagged a forced
    /// replace: unpin the old identity, then run the create sequence against
    /// the new inputs. The new state is recorded only once the create
    /// succeeds. The stored name is kept when the desired name is unset.
    pub fn update(
        &self,
        state: &PinResourceState,
        desired: &PinInputSet,
    ) -> Result<PinResourceState> {
        self.client
            .delete_pin(&state.id)
            .map_err(|e| e.context(format!("unpin '{}'", state.id)))?;
        let checksum = checksum::fingerprint(&desired.paths)?;
        let name = declared_name(desired).unwrap_or_else(|| state.name.clone());
        let identity = self
            .upload(desired, &name)
            .map_err(|e| e.context(format!("replace pin '{}'", state.id)))?;
        tracing::info!(old = %state.id, new = %identity.id, "pin replaced");
        Ok(record(identity, checksum))
    }

    /// Present -> Destroyed. A failed unpin aborts the transition; the
    /// caller's state stays Present until the service confirms.
    pub fn delete(&self, state: &PinResourceState) -> Result<()> {
        self.client
            .delete_pin(&state.id)
            .map_err(|e| e.context(format!("unpin '{}'", state.id)))?;
        tracing::info!(id = %state.id, "pin deleted");
        Ok(())
    }

    /// Re-hydrate state from a bare remote id. The checksum is unknown until
    /// a later plan recomputes it from local paths, so it is left empty,
    /// which any computed fingerprint will mismatch.
    pub fn import_by_id(&self, id: &str) -> Result<PinResourceState> {
        let identity = self
            .client
            .fetch_pin(id)
            .map_err(|e| e.context(format!("import pin '{id}'")))?;
        tracing::info!(id = %identity.id, cid = %identity.cid, "pin imported");
        Ok(record(identity, String::new()))
    }

    fn upload(&self, desired: &PinInputSet, name: &str) -> Result<RemotePinIdentity> {
        let files = desired
            .paths
            .iter()
            .cloned()
            .map(UploadFile::from_path)
            .collect::<Vec<_>>();
        let payload = upload::encode(&files, name, desired.cid_version)?;
        self.client.create_pin(payload)
    }
}

fn declared_name(desired: &PinInputSet) -> Option<String> {
    desired
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

// Millisecond timestamps keep synthesized names unique under normal clock
// resolution; a stalled clock can collide.
fn synthesized_name() -> String {
    format!(
        "{}-{}",
        SYNTHESIZED_NAME_PREFIX,
        chrono::Utc::now().timestamp_millis()
    )
}

fn record(identity: RemotePinIdentity, checksum: String) -> PinResourceState {
    PinResourceState {
        id: identity.id,
        cid: identity.cid,
        name: identity.name,
        checksum,
    }
}
