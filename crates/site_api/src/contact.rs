use shared::{
    domain::{ContactQuery, QueryId},
    error::ApiError,
    protocol::ContactSubmission,
};
use storage::NewContactQuery;
use tracing::info;

use crate::{internal, ApiContext};

pub const MAX_CONTACT_FIELD_BYTES: usize = 4000;

pub async fn submit_contact(
    ctx: &ApiContext,
    submission: ContactSubmission,
) -> Result<QueryId, ApiError> {
    let full_name = submission.full_name.trim();
    let phone_number = submission.phone_number.trim();
    let subject = submission.subject.trim();
    let message = submission.message.trim();

    let fields = [full_name, phone_number, subject, message];
    if fields.iter().any(|field| field.is_empty()) {
        return Err(ApiError::validation("All fields are required."));
    }
    if fields
        .iter()
        .any(|field| field.len() > MAX_CONTACT_FIELD_BYTES)
    {
        return Err(ApiError::validation(format!(
            "fields must be at most {MAX_CONTACT_FIELD_BYTES} bytes"
        )));
    }

    let id = ctx
        .storage
        .insert_contact_query(NewContactQuery {
            full_name,
            phone_number,
            subject,
            message,
        })
        .await
        .map_err(internal)?;
    info!(query_id = id.0, "contact form submitted");
    Ok(id)
}

pub async fn list_queries(ctx: &ApiContext) -> Result<Vec<ContactQuery>, ApiError> {
    ctx.storage.list_contact_queries().await.map_err(internal)
}

pub async fn delete_query(ctx: &ApiContext, id: QueryId) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .delete_contact_query(id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(ApiError::not_found("Query not found"));
    }
    info!(query_id = id.0, "contact query deleted");
    Ok(())
}
