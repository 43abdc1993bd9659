use serde::{Deserialize, Serialize};

use armory_core::{BaseId, EquipmentId, MovementId};
use armory_infra::{DashboardStats, MovementReceipt};
use armory_inventory::{
    IssueKind, MovementFilter, MovementKind, RecordAssignment, RecordPurchase, RecordTransfer,
};

use crate::context::CredentialContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub equipment_id: EquipmentId,
    #[serde(alias = "base_id")]
    pub to_base_id: BaseId,
    pub quantity: i64,
}

impl From<PurchaseRequest> for RecordPurchase {
    fn from(body: PurchaseRequest) -> Self {
        Self {
            equipment_id: body.equipment_id,
            base_id: body.to_base_id,
            quantity: body.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub equipment_id: EquipmentId,
    pub from_base_id: BaseId,
    pub to_base_id: BaseId,
    pub quantity: i64,
}

impl From<TransferRequest> for RecordTransfer {
    fn from(body: TransferRequest) -> Self {
        Self {
            equipment_id: body.equipment_id,
            from_base_id: body.from_base_id,
            to_base_id: body.to_base_id,
            quantity: body.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub equipment_id: EquipmentId,
    pub base_id: BaseId,
    pub personnel_name: String,
    pub quantity: i64,
    #[serde(alias = "type")]
    pub kind: String,
}

impl AssignRequest {
    pub fn into_command(self) -> Result<RecordAssignment, String> {
        let kind = match self.kind.trim() {
            "Assignment" => IssueKind::Assignment,
            "Expenditure" => IssueKind::Expenditure,
            other => {
                return Err(format!(
                    "kind must be Assignment or Expenditure, got '{other}'"
                ));
            }
        };

        Ok(RecordAssignment {
            equipment_id: self.equipment_id,
            base_id: self.base_id,
            quantity: self.quantity,
            kind,
            personnel_name: self.personnel_name,
        })
    }
}

/// Query string for `GET /movements`.
#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub kind: Option<String>,
    pub equipment_id: Option<EquipmentId>,
    pub base_id: Option<BaseId>,
}

impl MovementQuery {
    pub fn into_filter(self) -> Result<MovementFilter, String> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<MovementKind>().map_err(|e| e.to_string())?),
        };
        Ok(MovementFilter {
            kind,
            equipment_id: self.equipment_id,
            base_id: self.base_id,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MovementAck {
    pub message: String,
    pub movement_id: MovementId,
}

impl MovementAck {
    pub fn new(message: impl Into<String>, receipt: &MovementReceipt) -> Self {
        Self {
            message: message.into(),
            movement_id: receipt.movement.id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub opening_balance: i64,
    pub net_movement: i64,
    pub expended: i64,
    pub closing_balance: i64,
}

impl From<DashboardStats> for DashboardResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            opening_balance: stats.opening_balance,
            net_movement: stats.net_movement,
            expended: stats.expended_total,
            closing_balance: stats.closing_balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub principal_id: String,
    pub role: &'static str,
    pub base_id: Option<BaseId>,
}

impl From<&CredentialContext> for WhoAmIResponse {
    fn from(ctx: &CredentialContext) -> Self {
        Self {
            principal_id: ctx.principal_id().to_string(),
            role: ctx.role().as_str(),
            base_id: ctx.base_scope(),
        }
    }
}
