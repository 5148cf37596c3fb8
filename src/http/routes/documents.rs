//! Signature requests through BoldSign.

use axum::{extract::State, response::Response};

use crate::auth::{Permission, TenantContext};
use crate::http::extract::{Json, Path};
use crate::http::response::{created, ApiError, ApiResponse, ApiResult};
use crate::http::routes::{check_email, required};
use crate::http::server::AppState;
use crate::integrations::boldsign::{DocumentStatus, SignatureRequest};

fn validate(request: &SignatureRequest) -> Result<(), ApiError> {
    required("title", &request.title)?;
    if request.signers.is_empty() {
        return Err(ApiError::validation("at least one signer is required"));
    }
    for signer in &request.signers {
        required("signers.name", &signer.name)?;
        check_email("signers.emailAddress", &signer.email_address)?;
    }
    if request.file_urls.is_empty() {
        return Err(ApiError::validation("at least one file URL is required"));
    }
    Ok(())
}

pub async fn send(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<SignatureRequest>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::SendDocuments)?;
    validate(&request)?;

    let integrations = state.integrations.load_full();
    let sent = integrations.boldsign()?.send_document(&request).await?;
    tracing::info!(document_id = %sent.document_id, organization_id = %ctx.organization_id, "Document sent for signature");
    Ok(created(sent))
}

pub async fn status(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<DocumentStatus>> {
    ctx.auth.require(Permission::SendDocuments)?;
    let integrations = state.integrations.load_full();
    let status = integrations.boldsign()?.document_status(&id).await?;
    Ok(ApiResponse::ok(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::boldsign::Signer;

    #[test]
    fn test_validation() {
        let mut request = SignatureRequest {
            title: "MSA".into(),
            message: None,
            signers: vec![Signer { name: "Ann".into(), email_address: "ann@acme.test".into() }],
            file_urls: vec!["https://files.test/msa.pdf".into()],
        };
        assert!(validate(&request).is_ok());

        request.signers[0].email_address = "nope".into();
        assert!(validate(&request).is_err());

        request.signers.clear();
        assert!(validate(&request).is_err());
    }
}
