//! GraphQL schema: read views over the caller's tenant plus two mutations.

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Schema};

use crate::auth::{Identity, Permission};
use crate::db::models::{Client, Company, Kit, NewClient, NewKit, Profile};
use crate::db::{repo, DataStore};

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema. Resolvers read the store from schema data and the
/// caller's [`Identity`] from per-request data.
pub fn build_schema(store: Arc<dyn DataStore>) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}

fn error(code: &'static str, message: &str) -> async_graphql::Error {
    async_graphql::Error::new(message).extend_with(|_, ext| ext.set("code", code))
}

fn internal(e: impl std::fmt::Display) -> async_graphql::Error {
    tracing::error!(error = %e, "GraphQL resolver failed");
    error("INTERNAL_ERROR", "Internal server error")
}

fn identity<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Identity> {
    ctx.data_opt::<Identity>().ok_or_else(|| error("UNAUTHORIZED", "Unauthorized"))
}

fn tenant<'a>(ctx: &Context<'a>) -> async_graphql::Result<(&'a Identity, &'a str)> {
    let user = identity(ctx)?;
    let org = user
        .organization_id
        .as_deref()
        .ok_or_else(|| error("FORBIDDEN", "No organization associated with this account"))?;
    Ok((user, org))
}

fn store<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a dyn DataStore> {
    Ok(ctx.data::<Arc<dyn DataStore>>()?.as_ref())
}

fn require_name(name: &str) -> async_graphql::Result<()> {
    if name.trim().is_empty() {
        return Err(error("VALIDATION_ERROR", "name is required"));
    }
    Ok(())
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in user's profile.
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Profile>> {
        let user = identity(ctx)?;
        repo::get_profile(store(ctx)?, &user.id).await.map_err(internal)
    }

    async fn kits(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Kit>> {
        let (_, org) = tenant(ctx)?;
        repo::list_kits(store(ctx)?, org).await.map_err(internal)
    }

    async fn clients(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Client>> {
        let (_, org) = tenant(ctx)?;
        repo::list_clients(store(ctx)?, org).await.map_err(internal)
    }

    /// The caller's organization.
    async fn company(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Company>> {
        let (_, org) = tenant(ctx)?;
        repo::get_company(store(ctx)?, org).await.map_err(internal)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_kit(&self, ctx: &Context<'_>, input: NewKit) -> async_graphql::Result<Kit> {
        let (user, org) = tenant(ctx)?;
        if !user.role.has_permission(Permission::ManageKits) {
            return Err(error("FORBIDDEN", "Insufficient permissions"));
        }
        require_name(&input.name)?;
        repo::create_kit(store(ctx)?, org, &user.id, &input).await.map_err(internal)
    }

    async fn create_client(&self, ctx: &Context<'_>, input: NewClient) -> async_graphql::Result<Client> {
        let (user, org) = tenant(ctx)?;
        if !user.role.has_permission(Permission::ManageClients) {
            return Err(error("FORBIDDEN", "Insufficient permissions"));
        }
        require_name(&input.name)?;
        repo::create_client(store(ctx)?, org, &user.id, &input).await.map_err(internal)
    }
}
