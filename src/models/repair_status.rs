use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Repair progress of a service order.
///
/// Moves strictly forward one step at a time: PENDING -> IN_PROGRESS -> DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl RepairStatus {
    pub const ALL: [RepairStatus; 3] = [Self::Pending, Self::InProgress, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    /// Accepts canonical names and the Spanish spellings used by the shop.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "pending" | "pendiente" => Ok(Self::Pending),
            "in_progress" | "en_proceso" | "en_progreso" | "en_reparacion" => Ok(Self::InProgress),
            "done" | "terminado" | "listo" | "reparado" => Ok(Self::Done),
            _ => Err(ServiceError::ValidationError(format!(
                "Invalid repair status '{}'; allowed: PENDING, IN_PROGRESS, DONE",
                raw.trim()
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }

    /// Same state is a no-op and always allowed.
    pub fn can_transition_to(&self, next: RepairStatus) -> bool {
        *self == next || (!self.is_terminal() && next.rank() == self.rank() + 1)
    }

    pub fn transition_to(self, next: RepairStatus) -> Result<RepairStatus, ServiceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::ValidationError(format!(
                "Cannot transition repair status from {} to {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// First fault status that is not PENDING, in fault order; PENDING when
/// there is none. Values that do not parse are treated as PENDING.
pub fn resolve_fault_status<'a, I>(statuses: I) -> RepairStatus
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    statuses
        .into_iter()
        .flatten()
        .filter_map(|raw| RepairStatus::parse(raw).ok())
        .find(|status| *status != RepairStatus::Pending)
        .unwrap_or_default()
}

/// Status reported on reads: a non-default fault-derived status wins over
/// the persisted column.
pub fn effective_status(persisted: RepairStatus, from_faults: RepairStatus) -> RepairStatus {
    if from_faults != RepairStatus::Pending {
        from_faults
    } else {
        persisted
    }
}
