//! HTTP user-directory client.
//!
//! The directory is an external collaborator: this module only encodes
//! its request/response contracts (create, partial update, nearby
//! discovery) and never interprets the data beyond deserialization.

use serde::{Deserialize, Serialize};

use vicinity_shared::{Peer, UserProfile};

use crate::error::NetError;

/// Payload for `POST /users`.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    pub visible: bool,
    pub image_url: String,
}

/// Partial update for `PATCH /users?id=`.
///
/// Only the populated fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl UserPatch {
    /// A location-only patch, as issued by the location reporter.
    pub fn location(id: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    users: Vec<Peer>,
}

/// Typed client for the user-directory HTTP API.
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    api_base: String,
}

impl DirectoryClient {
    /// Build a client for the API mounted at `api_base`
    /// (e.g. `http://localhost:8080/api`).
    pub fn new(api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Register a new user. `POST /users`.
    pub async fn create_user(&self, user: &NewUser) -> Result<UserProfile, NetError> {
        let profile = self
            .http
            .post(format!("{}/users", self.api_base))
            .json(user)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile)
    }

    /// Partially update a user. `PATCH /users?id=`.
    pub async fn update_user(&self, patch: &UserPatch) -> Result<UserProfile, NetError> {
        let profile = self
            .http
            .patch(format!("{}/users?id={}", self.api_base, patch.id))
            .json(patch)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile)
    }

    /// Discover peers within `radius_km` of the given position,
    /// excluding `self_id`. `GET /users?lat&long&radius&id`.
    pub async fn nearby_users(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        self_id: i64,
    ) -> Result<Vec<Peer>, NetError> {
        let response: UsersResponse = self
            .http
            .get(format!("{}/users", self.api_base))
            .query(&[
                ("lat", latitude.to_string()),
                ("long", longitude.to_string()),
                ("radius", radius_km.to_string()),
                ("id", self_id.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_serializes_only_populated_fields() {
        let patch = UserPatch::location(5, 48.85, 2.35);
        let json = serde_json::to_value(&patch).unwrap();

        assert_eq!(json["id"], 5);
        assert_eq!(json["latitude"], 48.85);
        assert!(json.get("username").is_none());
        assert!(json.get("visible").is_none());
    }
}
