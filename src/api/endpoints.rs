//! Typed wrappers over the REST endpoints.

use serde_json::{json, Value};

use crate::api::client::{ApiClient, ApiRequest};
use crate::api::error::ApiError;
use crate::api::models::{
    AllocationItem, Commodity, CommodityRequest, Credentials, DashboardStats, Listing,
    LoginResponse, NewRequest, PasswordChangeRequest, RequestLog, StatusUpdate, UserProfile,
};

#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.client.post("/auth/login/", credentials).await
    }

    /// Invalidate `refresh` server-side.
    pub async fn logout(&self, refresh: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/auth/logout/", &json!({ "refresh": refresh }))?;
        self.client.send_unit(&request).await
    }

    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.client.get("/auth/profile/").await
    }

    pub async fn change_password(&self, change: &PasswordChangeRequest) -> Result<(), ApiError> {
        let request = ApiRequest::put("/auth/change-password/", change)?;
        self.client.send_unit(&request).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommoditiesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CommoditiesApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Commodity>, ApiError> {
        let listing: Listing<Commodity> = self.client.get("/commodities/").await?;
        Ok(listing.into_vec())
    }

    pub async fn get(&self, id: u64) -> Result<Commodity, ApiError> {
        self.client.get(&format!("/commodities/{}/", id)).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> RequestsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Requests visible to the caller; the server scopes them by role.
    pub async fn list(&self) -> Result<Vec<CommodityRequest>, ApiError> {
        let listing: Listing<CommodityRequest> = self.client.get("/requests/").await?;
        Ok(listing.into_vec())
    }

    pub async fn get(&self, id: u64) -> Result<CommodityRequest, ApiError> {
        self.client.get(&format!("/requests/{}/", id)).await
    }

    /// Returns the server's echo of the created request.
    pub async fn create(&self, request: &NewRequest) -> Result<Value, ApiError> {
        self.client.post("/requests/create/", request).await
    }

    pub async fn pending(&self) -> Result<Vec<CommodityRequest>, ApiError> {
        let listing: Listing<CommodityRequest> = self.client.get("/requests/pending/").await?;
        Ok(listing.into_vec())
    }

    pub async fn update_status(&self, id: u64, update: &StatusUpdate) -> Result<Value, ApiError> {
        self.client.put(&format!("/requests/{}/", id), update).await
    }

    pub async fn logs(&self, id: u64) -> Result<Vec<RequestLog>, ApiError> {
        let listing: Listing<RequestLog> =
            self.client.get(&format!("/requests/{}/logs/", id)).await?;
        Ok(listing.into_vec())
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.client.get("/requests/dashboard/stats/").await
    }

    /// Per-commodity usage for the current month (CHW only, server enforced).
    pub async fn allocation_status(&self) -> Result<Vec<AllocationItem>, ApiError> {
        self.client.get("/requests/allocation-status/").await
    }
}
