//! GraphQL over HTTP. The caller's identity, if any, is passed as request data.

use async_graphql::parser::{parse_query, types::OperationType};
use axum::{extract::State, Json};
use serde::Deserialize;

use crate::auth::MaybeIdentity;
use crate::http::extract;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    pub query: String,
    pub operation_name: Option<String>,
    /// JSON-encoded variables.
    pub variables: Option<String>,
}

fn with_identity(mut request: async_graphql::Request, identity: MaybeIdentity) -> async_graphql::Request {
    if let MaybeIdentity(Some(identity)) = identity {
        request = request.data(identity);
    }
    request
}

fn error_response(message: impl Into<String>) -> Json<async_graphql::Response> {
    Json(async_graphql::Response::from_errors(vec![async_graphql::ServerError::new(message, None)]))
}

pub async fn execute(
    State(state): State<AppState>,
    identity: MaybeIdentity,
    extract::Json(request): extract::Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    Json(state.schema.execute(with_identity(request, identity)).await)
}

/// Whether executing `query` could run a mutation. Without an operation name
/// every operation in the document counts.
fn selects_mutation(query: &str, operation_name: Option<&str>) -> Result<bool, String> {
    let document = parse_query(query).map_err(|e| e.to_string())?;
    Ok(document.operations.iter().any(|(name, operation)| {
        operation.node.ty == OperationType::Mutation
            && operation_name.map_or(true, |wanted| name.map(|n| n.as_str()) == Some(wanted))
    }))
}

/// Queries only; mutations must be POSTed.
pub async fn query(
    State(state): State<AppState>,
    identity: MaybeIdentity,
    extract::Query(params): extract::Query<GetParams>,
) -> Json<async_graphql::Response> {
    match selects_mutation(&params.query, params.operation_name.as_deref()) {
        Ok(false) => {}
        Ok(true) => return error_response("Mutations are not allowed over GET"),
        Err(e) => return error_response(e),
    }

    let mut request = async_graphql::Request::new(params.query);
    if let Some(name) = params.operation_name {
        request = request.operation_name(name);
    }
    if let Some(raw) = params.variables {
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => request = request.variables(async_graphql::Variables::from_json(value)),
            Err(e) => return error_response(format!("Invalid variables: {}", e)),
        }
    }

    Json(state.schema.execute(with_identity(request, identity)).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_is_allowed() {
        assert_eq!(selects_mutation("{ me { id } }", None), Ok(false));
        assert_eq!(selects_mutation("query Kits { kits { id } }", Some("Kits")), Ok(false));
    }

    #[test]
    fn test_mutation_is_detected_anywhere_in_document() {
        assert_eq!(selects_mutation("mutation { createKit(input: {name: \"x\"}) { id } }", None), Ok(true));
        assert_eq!(selects_mutation("# note\nmutation { createKit(input: {name: \"x\"}) { id } }", None), Ok(true));

        let doc = "query Q { __typename } mutation M { createKit(input: {name: \"x\"}) { id } }";
        assert_eq!(selects_mutation(doc, Some("M")), Ok(true));
        assert_eq!(selects_mutation(doc, None), Ok(true));
        assert_eq!(selects_mutation(doc, Some("Q")), Ok(false));
    }

    #[test]
    fn test_unparseable_document_is_an_error() {
        assert!(selects_mutation("{ kits {", None).is_err());
    }
}
