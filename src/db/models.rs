//! Typed views over hosted table rows.

use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PROFILES: &str = "profiles";
pub const COMPANIES: &str = "companies";
pub const CLIENTS: &str = "clients";
pub const KITS: &str = "kits";
pub const EXPERIMENTS: &str = "experiments";
pub const API_KEYS: &str = "api_keys";

fn default_active() -> String {
    "active".to_string()
}

fn default_draft() -> String {
    "draft".to_string()
}

/// A user's profile row. `role` holds the stored literal verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    #[serde(default = "default_active")]
    pub status: String,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A tenant organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A client being onboarded by a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct Client {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An onboarding kit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct Kit {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_draft")]
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub hypothesis: Option<String>,
    #[serde(default = "default_draft")]
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Stored API key metadata. The secret itself is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub prefix: String,
    #[serde(default, skip_serializing)]
    pub key_hash: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, InputObject)]
pub struct NewKit {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, InputObject)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExperiment {
    pub name: String,
    pub hypothesis: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApiKey {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
}
