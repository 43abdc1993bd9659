use serde::Serialize;

/// Operation identifier checked by the access gate.
///
/// Every ledger mutation and every privileged read maps to exactly one kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DashboardRead,
    /// Movement history, balance listing and reconciliation.
    AuditRead,
    Purchase,
    Transfer,
    Assignment,
    Expenditure,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::DashboardRead => "dashboard.read",
            OperationKind::AuditRead => "audit.read",
            OperationKind::Purchase => "assets.purchase",
            OperationKind::Transfer => "assets.transfer",
            OperationKind::Assignment => "assets.assign",
            OperationKind::Expenditure => "assets.expend",
        }
    }

    /// Operations where a base-scoped role may only target its own base.
    pub fn is_base_restricted(&self) -> bool {
        matches!(self, OperationKind::Assignment | OperationKind::Expenditure)
    }
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
