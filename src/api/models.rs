use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "CHW")]
    Chw,
    #[serde(rename = "CHA")]
    Cha,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Chw, Role::Cha, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Chw => "CHW",
            Role::Cha => "CHA",
            Role::Admin => "ADMIN",
        }
    }

    /// CHAs and admins may approve or reject requests.
    pub fn can_approve_requests(&self) -> bool {
        matches!(self, Role::Cha | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CHW" => Ok(Role::Chw),
            "CHA" => Ok(Role::Cha),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Profile of the signed-in user as served by `/auth/profile/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "phone")]
    pub phone_number: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active_worker: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_joined: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Delivered,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Delivered => "DELIVERED",
        }
    }

    /// "Pending", "Approved", ...
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Delivered => "Delivered",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RequestStatus::Pending),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REJECTED" => Ok(RequestStatus::Rejected),
            "DELIVERED" => Ok(RequestStatus::Delivered),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityRequest {
    pub id: u64,
    #[serde(default)]
    pub commodity: Option<u64>,
    pub commodity_name: String,
    #[serde(default)]
    pub commodity_unit: String,
    pub quantity_requested: u32,
    #[serde(default)]
    pub quantity_approved: Option<u32>,
    pub status: RequestStatus,
    #[serde(default)]
    pub status_display: Option<String>,
    #[serde(default)]
    pub requester_name: String,
    #[serde(default)]
    pub approver_name: Option<String>,
    #[serde(default)]
    pub reason_for_request: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl CommodityRequest {
    /// Approved quantity, only when it differs from what was asked for.
    pub fn adjusted_quantity(&self) -> Option<u32> {
        self.quantity_approved
            .filter(|q| *q != 0 && *q != self.quantity_requested)
    }

    pub fn status_text(&self) -> &str {
        self.status_display
            .as_deref()
            .unwrap_or_else(|| self.status.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub unit_of_measure: String,
    pub max_quantity_per_request: u32,
    pub max_monthly_allocation: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCommodity {
    #[serde(rename = "commodity__name")]
    pub commodity_name: String,
    #[serde(default)]
    pub request_count: u64,
    #[serde(default)]
    pub total_quantity: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_requests: u64,
    pub pending_requests: u64,
    pub approved_requests: u64,
    pub rejected_requests: u64,
    pub monthly_requests: u64,
    #[serde(default)]
    pub top_commodities: Vec<TopCommodity>,
    #[serde(default)]
    pub recent_requests: Vec<CommodityRequest>,
}

/// One row of `/requests/allocation-status/`: this month's usage of a commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationItem {
    pub commodity_id: u64,
    pub commodity_name: String,
    pub max_allocation: u32,
    pub used: u32,
    pub remaining: i64,
    pub percentage_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: u64,
    pub action: String,
    #[serde(default)]
    pub action_display: Option<String>,
    #[serde(default)]
    pub performed_by_name: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Body of `POST /requests/create/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRequest {
    pub commodity: u64,
    pub quantity_requested: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason_for_request: String,
}

/// Decision a CHA/ADMIN can apply to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewAction {
    Approved,
    Rejected,
}

/// Body of `PUT /requests/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub status: ReviewAction,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_approved: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// List endpoints answer with either a paginated envelope or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Plain(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_json() -> serde_json::Value {
        json!({
            "id": 11,
            "requester": 3,
            "requester_name": "Amina Otieno",
            "approver": null,
            "approver_name": null,
            "commodity": 2,
            "commodity_name": "Paracetamol",
            "commodity_unit": "tablets",
            "quantity_requested": 40,
            "quantity_approved": null,
            "status": "PENDING",
            "status_display": "Pending",
            "reason_for_request": "Stock out",
            "rejection_reason": null,
            "notes": null,
            "created_at": "2025-03-04T08:15:00Z",
            "approved_at": null,
            "delivered_at": null,
            "updated_at": "2025-03-04T08:15:00Z"
        })
    }

    #[test]
    fn test_request_deserializes_backend_shape() {
        let req: CommodityRequest = serde_json::from_value(request_json()).unwrap();
        assert_eq!(req.id, 11);
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.quantity_approved, None);
        assert_eq!(req.status_text(), "Pending");
        assert_eq!(req.adjusted_quantity(), None);
    }

    #[test]
    fn test_adjusted_quantity_only_when_different() {
        let mut req: CommodityRequest = serde_json::from_value(request_json()).unwrap();
        req.quantity_approved = Some(40);
        assert_eq!(req.adjusted_quantity(), None);
        req.quantity_approved = Some(25);
        assert_eq!(req.adjusted_quantity(), Some(25));
    }

    #[test]
    fn test_role_wire_names() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": 1,
            "username": "cha1",
            "role": "CHA",
            "first_name": "Grace",
            "last_name": "Wanjiru",
            "email": "grace@example.org",
            "phone_number": "0712345678",
            "location": "Kisumu"
        }))
        .unwrap();
        assert_eq!(profile.role, Role::Cha);
        assert!(profile.role.can_approve_requests());
        assert!(profile.is_active_worker);
        assert_eq!(profile.full_name(), "Grace Wanjiru");
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("ADMIN"));
        assert!("unknown".parse::<Role>().is_err());
        assert_eq!("chw".parse::<Role>().unwrap(), Role::Chw);
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let page: Listing<CommodityRequest> =
            serde_json::from_value(json!({"count": 1, "next": null, "results": [request_json()]}))
                .unwrap();
        assert_eq!(page.into_vec().len(), 1);

        let plain: Listing<CommodityRequest> =
            serde_json::from_value(json!([request_json(), request_json()])).unwrap();
        assert_eq!(plain.into_vec().len(), 2);
    }

    #[test]
    fn test_status_update_body() {
        let approve = StatusUpdate {
            status: ReviewAction::Approved,
            notes: String::new(),
            quantity_approved: Some(30),
            rejection_reason: None,
        };
        assert_eq!(
            serde_json::to_value(&approve).unwrap(),
            json!({"status": "APPROVED", "notes": "", "quantity_approved": 30})
        );
    }
}
