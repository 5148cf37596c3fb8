//! Typed table operations used by route handlers and resolvers.
//!
//! Tenant-scoped reads and writes always filter on `organization_id`.

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::auth::roles::Role;
use crate::db::models::*;
use crate::db::store::{now_timestamp, DataStore, DbError, DbResult, Query};

/// Plaintext API keys start with this marker.
pub const API_KEY_MARKER: &str = "ohk_";

const LIST_LIMIT: usize = 200;

fn decode<T: DeserializeOwned>(row: Value) -> DbResult<T> {
    serde_json::from_value(row).map_err(|e| DbError::Decode(e.to_string()))
}

fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> DbResult<Vec<T>> {
    rows.into_iter().map(decode).collect()
}

async fn first<T: DeserializeOwned>(store: &dyn DataStore, table: &str, query: Query) -> DbResult<Option<T>> {
    let rows = store.select(table, &query.limit(1)).await?;
    rows.into_iter().next().map(decode).transpose()
}

fn tenant(organization_id: &str) -> Query {
    Query::new().eq("organization_id", organization_id)
}

// Profiles

pub async fn get_profile(store: &dyn DataStore, id: &str) -> DbResult<Option<Profile>> {
    first(store, PROFILES, Query::new().eq("id", id)).await
}

/// Return the caller's profile, creating it on first sign-in. A concurrent
/// first request that inserts the row first wins; the loser re-reads it.
pub async fn ensure_profile(store: &dyn DataStore, id: &str, email: Option<&str>) -> DbResult<Profile> {
    if let Some(profile) = get_profile(store, id).await? {
        return Ok(profile);
    }

    tracing::info!(user_id = %id, "Creating profile on first sign-in");
    let inserted = store
        .insert(
            PROFILES,
            json!({
                "id": id,
                "email": email,
                "role": Role::User.as_str(),
                "status": "active",
                "created_at": now_timestamp(),
            }),
        )
        .await;

    match inserted {
        Ok(row) => decode(row),
        Err(DbError::Conflict(_)) => {
            tracing::debug!(user_id = %id, "Profile created concurrently; re-reading");
            get_profile(store, id)
                .await?
                .ok_or_else(|| DbError::Decode(format!("profile {} conflicted but is missing", id)))
        }
        Err(e) => Err(e),
    }
}

pub async fn update_profile(store: &dyn DataStore, id: &str, update: &ProfileUpdate) -> DbResult<Option<Profile>> {
    let mut patch = serde_json::Map::new();
    if let Some(name) = &update.full_name {
        patch.insert("full_name".into(), json!(name));
    }
    patch.insert("updated_at".into(), json!(now_timestamp()));

    let rows = store.update(PROFILES, &Query::new().eq("id", id), Value::Object(patch)).await?;
    rows.into_iter().next().map(decode).transpose()
}

/// Persist `role` verbatim on the profile.
pub async fn update_role(store: &dyn DataStore, id: &str, role: &str) -> DbResult<Option<Profile>> {
    let rows = store
        .update(
            PROFILES,
            &Query::new().eq("id", id),
            json!({ "role": role, "updated_at": now_timestamp() }),
        )
        .await?;
    rows.into_iter().next().map(decode).transpose()
}

pub async fn set_avatar_url(store: &dyn DataStore, id: &str, url: &str) -> DbResult<Option<Profile>> {
    let rows = store
        .update(
            PROFILES,
            &Query::new().eq("id", id),
            json!({ "avatar_url": url, "updated_at": now_timestamp() }),
        )
        .await?;
    rows.into_iter().next().map(decode).transpose()
}

pub async fn list_organization_users(store: &dyn DataStore, organization_id: &str) -> DbResult<Vec<Profile>> {
    let rows = store
        .select(PROFILES, &tenant(organization_id).order_asc("created_at").limit(LIST_LIMIT))
        .await?;
    decode_all(rows)
}

/// Rows of `table` owned by the organization, without a list limit.
pub async fn count_in_organization(store: &dyn DataStore, table: &str, organization_id: &str) -> DbResult<usize> {
    store.count_matching(table, &tenant(organization_id)).await
}

pub async fn count_active_api_keys(store: &dyn DataStore, organization_id: &str) -> DbResult<usize> {
    store
        .count_matching(API_KEYS, &tenant(organization_id).is_null("revoked_at"))
        .await
}

// Companies

pub async fn get_company(store: &dyn DataStore, id: &str) -> DbResult<Option<Company>> {
    first(store, COMPANIES, Query::new().eq("id", id)).await
}

pub async fn update_company(store: &dyn DataStore, id: &str, patch: Value) -> DbResult<Option<Company>> {
    let rows = store.update(COMPANIES, &Query::new().eq("id", id), patch).await?;
    rows.into_iter().next().map(decode).transpose()
}

/// Update the company billed under `customer_id`; returns how many rows matched.
pub async fn update_company_by_customer(store: &dyn DataStore, customer_id: &str, patch: Value) -> DbResult<usize> {
    let rows = store
        .update(COMPANIES, &Query::new().eq("stripe_customer_id", customer_id), patch)
        .await?;
    Ok(rows.len())
}

// Clients

pub async fn list_clients(store: &dyn DataStore, organization_id: &str) -> DbResult<Vec<Client>> {
    let rows = store
        .select(CLIENTS, &tenant(organization_id).order_desc("created_at").limit(LIST_LIMIT))
        .await?;
    decode_all(rows)
}

pub async fn get_client(store: &dyn DataStore, organization_id: &str, id: &str) -> DbResult<Option<Client>> {
    first(store, CLIENTS, tenant(organization_id).eq("id", id)).await
}

pub async fn create_client(
    store: &dyn DataStore,
    organization_id: &str,
    created_by: &str,
    input: &NewClient,
) -> DbResult<Client> {
    let row = store
        .insert(
            CLIENTS,
            json!({
                "organization_id": organization_id,
                "name": input.name.trim(),
                "email": input.email,
                "status": "active",
                "created_by": created_by,
                "created_at": now_timestamp(),
            }),
        )
        .await?;
    decode(row)
}

// Kits

pub async fn list_kits(store: &dyn DataStore, organization_id: &str) -> DbResult<Vec<Kit>> {
    let rows = store
        .select(KITS, &tenant(organization_id).order_desc("created_at").limit(LIST_LIMIT))
        .await?;
    decode_all(rows)
}

pub async fn create_kit(store: &dyn DataStore, organization_id: &str, created_by: &str, input: &NewKit) -> DbResult<Kit> {
    let row = store
        .insert(
            KITS,
            json!({
                "organization_id": organization_id,
                "name": input.name.trim(),
                "description": input.description,
                "status": "draft",
                "created_by": created_by,
                "created_at": now_timestamp(),
            }),
        )
        .await?;
    decode(row)
}

// Experiments

pub async fn list_experiments(store: &dyn DataStore, organization_id: &str) -> DbResult<Vec<Experiment>> {
    let rows = store
        .select(EXPERIMENTS, &tenant(organization_id).order_desc("created_at").limit(LIST_LIMIT))
        .await?;
    decode_all(rows)
}

pub async fn create_experiment(store: &dyn DataStore, organization_id: &str, input: &NewExperiment) -> DbResult<Experiment> {
    let row = store
        .insert(
            EXPERIMENTS,
            json!({
                "organization_id": organization_id,
                "name": input.name.trim(),
                "hypothesis": input.hypothesis,
                "status": "draft",
                "created_at": now_timestamp(),
            }),
        )
        .await?;
    decode(row)
}

// API keys

/// SHA-256 hex digest of a plaintext key.
pub fn hash_api_key(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

fn generate_api_key() -> String {
    let mut secret = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut secret);
    format!("{}{}", API_KEY_MARKER, hex::encode(secret))
}

/// Active (unrevoked) keys of an organization.
pub async fn list_api_keys(store: &dyn DataStore, organization_id: &str) -> DbResult<Vec<ApiKey>> {
    let rows = store
        .select(
            API_KEYS,
            &tenant(organization_id).is_null("revoked_at").order_desc("created_at").limit(LIST_LIMIT),
        )
        .await?;
    decode_all(rows)
}

/// Create a key and return its metadata together with the plaintext, which is not stored.
pub async fn create_api_key(
    store: &dyn DataStore,
    organization_id: &str,
    created_by: &str,
    input: &NewApiKey,
) -> DbResult<(ApiKey, String)> {
    let plaintext = generate_api_key();
    let prefix: String = plaintext.chars().take(API_KEY_MARKER.len() + 8).collect();

    let row = store
        .insert(
            API_KEYS,
            json!({
                "organization_id": organization_id,
                "name": input.name.trim(),
                "prefix": prefix,
                "key_hash": hash_api_key(&plaintext),
                "created_by": created_by,
                "created_at": now_timestamp(),
                "revoked_at": null,
            }),
        )
        .await?;
    Ok((decode(row)?, plaintext))
}

/// Mark a key revoked. Returns false when no active key with that id exists in the tenant.
pub async fn revoke_api_key(store: &dyn DataStore, organization_id: &str, id: &str) -> DbResult<bool> {
    let rows = store
        .update(
            API_KEYS,
            &tenant(organization_id).eq("id", id).is_null("revoked_at"),
            json!({ "revoked_at": now_timestamp() }),
        )
        .await?;
    Ok(!rows.is_empty())
}
