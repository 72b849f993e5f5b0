//! Directory Action Executor.
//!
//! Applies approve/block/delete/wipe to exactly one device. Validation runs
//! in a fixed order and stops at the first failure:
//!
//! 1. action name
//! 2. exactly one of `sn` / `imei`
//! 3. domain is configured
//! 4. device lookup in the canonical store, scoped to the domain
//! 5. lifecycle pre-condition (approve only)
//! 6. explicit confirmation
//!
//! Only then is the remote action issued. No local state is ever changed;
//! the new status is observed on the next reconciliation cycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleet_core::{
    config::{FleetConfig, WipeKind},
    normalize::normalize,
    DeviceRecord, DomainName, LifecycleState,
};

use crate::error::ProviderError;
use crate::provider::{CanonicalStore, InventoryProvider};
use crate::translate::translate_store;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Approve,
    Block,
    Delete,
    Wipe,
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ActionKind::Approve),
            "block" => Ok(ActionKind::Block),
            "delete" => Ok(ActionKind::Delete),
            "wipe" => Ok(ActionKind::Wipe),
            other => Err(ActionError::InvalidRequest(format!(
                "unknown action '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Approve => "approve",
            ActionKind::Block => "block",
            ActionKind::Delete => "delete",
            ActionKind::Wipe => "wipe",
        };
        f.write_str(s)
    }
}

/// Action as sent to the authoritative source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteAction {
    Approve,
    Block,
    Delete,
    Wipe(WipeKind),
}

impl RemoteAction {
    pub fn for_kind(kind: ActionKind, wipe: WipeKind) -> Self {
        match kind {
            ActionKind::Approve => RemoteAction::Approve,
            ActionKind::Block => RemoteAction::Block,
            ActionKind::Delete => RemoteAction::Delete,
            ActionKind::Wipe => RemoteAction::Wipe(wipe),
        }
    }
}

impl fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteAction::Approve => f.write_str("approve"),
            RemoteAction::Block => f.write_str("block"),
            RemoteAction::Delete => f.write_str("delete"),
            RemoteAction::Wipe(kind) => write!(f, "{kind}"),
        }
    }
}

/// Wire shape of an action request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRequest {
    pub action: String,
    pub confirm: bool,
    pub domain: String,
    pub imei: String,
    pub sn: String,
    /// Accepted for shape compatibility; not verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// How the request identifies its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLocator {
    Serial(String),
    Imei(String),
}

impl DeviceLocator {
    fn matches(&self, record: &DeviceRecord) -> bool {
        match self {
            DeviceLocator::Serial(sn) => record.serial_number == *sn,
            DeviceLocator::Imei(imei) => record.imei == *imei,
        }
    }
}

impl fmt::Display for DeviceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceLocator::Serial(sn) => write!(f, "sn {sn}"),
            DeviceLocator::Imei(imei) => write!(f, "imei {imei}"),
        }
    }
}

impl ActionRequest {
    /// The normalized identifier, if exactly one of `sn`/`imei` is set.
    pub fn locator(&self) -> Result<DeviceLocator, ActionError> {
        let sn = normalize(&self.sn);
        let imei = normalize(&self.imei);
        match (sn.is_empty(), imei.is_empty()) {
            (false, true) => Ok(DeviceLocator::Serial(sn)),
            (true, false) => Ok(DeviceLocator::Imei(imei)),
            (true, true) => Err(ActionError::InvalidRequest(
                "one of sn or imei is required".into(),
            )),
            (false, false) => Err(ActionError::InvalidRequest(
                "specify sn or imei, not both".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("domain '{0}' is not a configured domain")]
    UnknownDomain(String),

    #[error("device not found in {domain}: {detail}")]
    DeviceNotFound { domain: String, detail: String },

    #[error("cannot {action} a device in state {state}")]
    InvalidStateTransition { action: ActionKind, state: String },

    #[error("{action} requires confirmation")]
    ConfirmationRequired { action: ActionKind },

    #[error("canonical store unavailable: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    #[error("{action} failed: {source}")]
    ActionFailed {
        action: ActionKind,
        #[source]
        source: ProviderError,
    },
}

impl ActionError {
    /// Stable taxonomy code returned to automated callers.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::InvalidRequest(_) => "INVALID_REQUEST",
            ActionError::UnknownDomain(_) => "UNKNOWN_DOMAIN",
            ActionError::DeviceNotFound { .. } => "DEVICE_NOT_FOUND",
            ActionError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ActionError::ConfirmationRequired { .. } => "CONFIRMATION_REQUIRED",
            ActionError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            ActionError::ActionFailed { .. } => "ACTION_FAILED",
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// A request that passed every check except confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAction {
    pub kind: ActionKind,
    pub remote: RemoteAction,
    pub domain: DomainName,
    pub device: DeviceRecord,
}

/// What was done, for the caller's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: ActionKind,
    pub remote_action: String,
    pub domain: DomainName,
    pub serial_number: String,
    pub imei: String,
    pub owner_email: String,
    /// Status at the time the action was issued.
    pub status: String,
}

pub struct ActionExecutor<'a> {
    config: &'a FleetConfig,
    store: &'a dyn CanonicalStore,
    inventory: &'a dyn InventoryProvider,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        config: &'a FleetConfig,
        store: &'a dyn CanonicalStore,
        inventory: &'a dyn InventoryProvider,
    ) -> Self {
        Self {
            config,
            store,
            inventory,
        }
    }

    /// Run validation steps 1–5. Used by interactive callers to show the
    /// device before asking for confirmation.
    pub fn prepare(&self, request: &ActionRequest) -> Result<PreparedAction, ActionError> {
        let kind: ActionKind = request.action.parse()?;
        let locator = request.locator()?;

        let domain = request.domain.trim();
        if domain.is_empty() || !self.config.is_domain_configured(domain) {
            return Err(ActionError::UnknownDomain(domain.to_string()));
        }
        let domain = DomainName::from(domain);

        let device = self.lookup(&domain, &locator)?;

        if kind == ActionKind::Approve
            && !matches!(
                device.lifecycle(),
                LifecycleState::Pending | LifecycleState::Blocked
            )
        {
            return Err(ActionError::InvalidStateTransition {
                action: kind,
                state: device.status.clone(),
            });
        }

        Ok(PreparedAction {
            kind,
            remote: RemoteAction::for_kind(kind, self.config.remote_wipe_type),
            domain,
            device,
        })
    }

    /// Validate and, if confirmed, issue the action.
    pub fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        let result = self.execute_inner(request);
        match &result {
            Ok(outcome) => tracing::info!(
                "{} issued for {} in {}",
                outcome.remote_action,
                outcome.serial_number,
                outcome.domain
            ),
            Err(e) => tracing::warn!(
                "action {} in {} rejected [{}]: {e}",
                request.action,
                request.domain,
                e.code()
            ),
        }
        result
    }

    fn execute_inner(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        let prepared = self.prepare(request)?;
        if !request.confirm {
            return Err(ActionError::ConfirmationRequired {
                action: prepared.kind,
            });
        }
        self.issue(&prepared)?;
        Ok(ActionOutcome {
            action: prepared.kind,
            remote_action: prepared.remote.to_string(),
            domain: prepared.domain,
            serial_number: prepared.device.serial_number,
            imei: prepared.device.imei,
            owner_email: prepared.device.owner_email,
            status: prepared.device.status,
        })
    }

    fn issue(&self, prepared: &PreparedAction) -> Result<(), ActionError> {
        if prepared.device.resource_id.is_empty() {
            return Err(ActionError::ActionFailed {
                action: prepared.kind,
                source: ProviderError::Rejected("device has no resource id".into()),
            });
        }
        self.inventory
            .issue_action(
                &prepared.domain,
                &prepared.device.resource_id,
                &prepared.remote,
            )
            .map_err(|source| ActionError::ActionFailed {
                action: prepared.kind,
                source,
            })
    }

    fn lookup(&self, domain: &DomainName, locator: &DeviceLocator) -> Result<DeviceRecord, ActionError> {
        let natives = self
            .store
            .fetch(Some(domain))
            .map_err(ActionError::ProviderUnavailable)?;
        let mut matches: Vec<DeviceRecord> = natives
            .iter()
            .filter_map(|n| translate_store(n).ok())
            .filter(|r| &r.domain == domain && locator.matches(r))
            .collect();

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(ActionError::DeviceNotFound {
                domain: domain.to_string(),
                detail: format!("no device with {locator}"),
            }),
            n => Err(ActionError::DeviceNotFound {
                domain: domain.to_string(),
                detail: format!("{n} devices match {locator}"),
            }),
        }
    }
}
