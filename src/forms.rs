//! Client-side form checks. A draft that fails validation never reaches the API.

use serde_json::Value;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::models::{
    Commodity, CommodityRequest, NewRequest, PasswordChangeRequest, ReviewAction, StatusUpdate,
};
use crate::api::{ApiClient, AuthApi, RequestsApi};

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 99;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please fill in all required fields")]
    MissingFields,

    #[error("Quantity must be a whole number between 1 and 99")]
    QuantityOutOfRange,

    #[error("Maximum {max} {unit} per request")]
    ExceedsCommodityLimit { max: u32, unit: String },

    #[error("Please select an action")]
    MissingAction,

    #[error("Please enter a valid approved quantity")]
    InvalidApprovedQuantity,

    #[error("Approved quantity cannot exceed the {requested} requested")]
    ApprovedExceedsRequested { requested: u32 },

    #[error("Please provide a reason for rejection")]
    MissingRejectionReason,

    #[error("New passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
}

/// New-request form as typed by a CHW. Quantity is kept as raw input.
#[derive(Debug, Clone, Default)]
pub struct RequestDraft {
    pub commodity: Option<u64>,
    pub quantity_requested: String,
    pub reason_for_request: String,
}

impl RequestDraft {
    pub fn validate(&self) -> Result<NewRequest, FormError> {
        let raw = self.quantity_requested.trim();
        let Some(commodity) = self.commodity else {
            return Err(FormError::MissingFields);
        };
        if raw.is_empty() {
            return Err(FormError::MissingFields);
        }

        let quantity: i64 = raw.parse().map_err(|_| FormError::QuantityOutOfRange)?;
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
            return Err(FormError::QuantityOutOfRange);
        }

        Ok(NewRequest {
            commodity,
            quantity_requested: quantity as u32,
            reason_for_request: self.reason_for_request.trim().to_string(),
        })
    }

    /// Like [`validate`](Self::validate), plus the selected commodity's per-request cap.
    pub fn validate_for(&self, commodity: &Commodity) -> Result<NewRequest, FormError> {
        let request = self.validate()?;
        if request.quantity_requested > commodity.max_quantity_per_request {
            return Err(FormError::ExceedsCommodityLimit {
                max: commodity.max_quantity_per_request,
                unit: commodity.unit_of_measure.clone(),
            });
        }
        Ok(request)
    }
}

/// Approve/reject decision being prepared by a CHA or admin.
#[derive(Debug, Clone, Default)]
pub struct ReviewDraft {
    pub action: Option<ReviewAction>,
    pub quantity_approved: Option<i64>,
    pub rejection_reason: String,
    pub notes: String,
}

impl ReviewDraft {
    pub fn validate(&self) -> Result<StatusUpdate, FormError> {
        let notes = self.notes.trim().to_string();
        match self.action {
            None => Err(FormError::MissingAction),
            Some(ReviewAction::Approved) => {
                let quantity = self
                    .quantity_approved
                    .filter(|q| *q >= 1 && *q <= u32::MAX as i64)
                    .ok_or(FormError::InvalidApprovedQuantity)?;
                Ok(StatusUpdate {
                    status: ReviewAction::Approved,
                    notes,
                    quantity_approved: Some(quantity as u32),
                    rejection_reason: None,
                })
            }
            Some(ReviewAction::Rejected) => {
                let reason = self.rejection_reason.trim();
                if reason.is_empty() {
                    return Err(FormError::MissingRejectionReason);
                }
                Ok(StatusUpdate {
                    status: ReviewAction::Rejected,
                    notes,
                    quantity_approved: None,
                    rejection_reason: Some(reason.to_string()),
                })
            }
        }
    }

    /// Review against the request being decided. An approval without a
    /// quantity grants what was asked for, and never more than that.
    pub fn validate_for(&self, request: &CommodityRequest) -> Result<StatusUpdate, FormError> {
        let requested = request.quantity_requested;
        let draft = match (self.action, self.quantity_approved) {
            (Some(ReviewAction::Approved), None) => ReviewDraft {
                quantity_approved: Some(i64::from(requested)),
                ..self.clone()
            },
            _ => self.clone(),
        };

        let update = draft.validate()?;
        match update.quantity_approved {
            Some(quantity) if quantity > requested => {
                Err(FormError::ApprovedExceedsRequested { requested })
            }
            _ => Ok(update),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<PasswordChangeRequest, FormError> {
        if self.old_password.is_empty()
            || self.new_password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(FormError::MissingFields);
        }
        if self.new_password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort);
        }
        Ok(PasswordChangeRequest {
            old_password: self.old_password.clone(),
            new_password: self.new_password.clone(),
            confirm_password: self.confirm_password.clone(),
        })
    }
}

pub async fn submit_request(
    client: &ApiClient,
    draft: &RequestDraft,
    commodity: Option<&Commodity>,
) -> Result<Value, ApiError> {
    let request = match commodity {
        Some(c) => draft.validate_for(c)?,
        None => draft.validate()?,
    };
    debug!(
        commodity = request.commodity,
        quantity = request.quantity_requested,
        "submitting commodity request"
    );
    RequestsApi::new(client).create(&request).await
}

pub async fn submit_review(
    client: &ApiClient,
    request_id: u64,
    draft: &ReviewDraft,
    request: Option<&CommodityRequest>,
) -> Result<Value, ApiError> {
    let update = match request {
        Some(r) => draft.validate_for(r)?,
        None => draft.validate()?,
    };
    debug!(request_id, status = ?update.status, "submitting review");
    RequestsApi::new(client).update_status(request_id, &update).await
}

pub async fn submit_password_change(
    client: &ApiClient,
    change: &PasswordChange,
) -> Result<(), ApiError> {
    let request = change.validate()?;
    AuthApi::new(client).change_password(&request).await
}
