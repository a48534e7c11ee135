#![allow(clippy::unused_async)]
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::WithRejection;
use kernel::{CreateResource, ErrorReply, RepairReport, Resource, UpdateResource};
use utoipa::OpenApi;

use crate::error::ResourceError;
use crate::reply::ContentReply;
use crate::{ApiDoc, AppState, Service};

/// Creates a resource and its mirror file.
#[utoipa::path(
    post,
    path = "/resources",
    request_body = CreateResource,
    responses(
        (status = 201, description = "Resource created", body = Resource),
        (status = 400, description = "Invalid name or content", body = ErrorReply),
        (status = 409, description = "Name already taken", body = ErrorReply),
        (status = 503, description = "Store temporarily unavailable", body = ErrorReply)
    ),
    tag = "resources",
)]
pub async fn create_resource(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CreateResource>, ResourceError>,
) -> Result<impl IntoResponse, ResourceError> {
    let content = decode(&body.content)?;
    let created = execute(&state, move |service| {
        service.create(&body.name, &content, &body.content_type)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(Resource::from(created))))
}

/// Lists all resources
#[utoipa::path(
    get,
    path = "/resources",
    responses(
        (status = 200, description = "All resources ordered by name", body = [Resource]),
    ),
    tag = "resources",
)]
pub async fn list_resources(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ResourceError> {
    let resources = execute(&state, |service| service.list()).await?;
    let reply: Vec<Resource> = resources.into_iter().map(Resource::from).collect();
    Ok(Json(reply))
}

/// Gets resource by name
#[utoipa::path(
    get,
    path = "/resources/{name}",
    responses(
        (status = 200, body = Resource),
        (status = 400, description = "Invalid name", body = ErrorReply),
        (status = 404, description = "Resource not found", body = ErrorReply)
    ),
    tag = "resources",
    params(
        ("name" = String, Path, description = "Resource name")
    ),
)]
pub async fn get_resource(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ResourceError> {
    let resource = execute(&state, move |service| service.read(&name)).await?;
    Ok(Json(Resource::from(resource)))
}

/// Gets resource payload by name, served with its declared content type
#[utoipa::path(
    get,
    path = "/resources/{name}/content",
    responses(
        (status = 200, response = ContentReply),
        (status = 404, description = "Resource not found", body = ErrorReply)
    ),
    tag = "resources",
    params(
        ("name" = String, Path, description = "Resource name")
    ),
)]
pub async fn get_resource_content(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ResourceError> {
    let resource = execute(&state, move |service| service.read(&name)).await?;
    Ok(ContentReply::new(resource))
}

/// Replaces content and content type of a resource.
///
/// When the row is committed but the mirror file cannot be rewritten the reply
/// is still 200 and carries a `warning`.
#[utoipa::path(
    put,
    path = "/resources/{name}",
    request_body = UpdateResource,
    responses(
        (status = 200, description = "Resource updated", body = Resource),
        (status = 400, description = "Invalid name or content", body = ErrorReply),
        (status = 404, description = "Resource not found", body = ErrorReply)
    ),
    tag = "resources",
    params(
        ("name" = String, Path, description = "Resource name")
    ),
)]
pub async fn update_resource(
    Path(name): Path<String>,
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateResource>, ResourceError>,
) -> Result<impl IntoResponse, ResourceError> {
    let content = decode(&body.content)?;
    let updated = execute(&state, move |service| {
        service.update(&name, &content, &body.content_type)
    })
    .await?;
    Ok(Json(Resource::from(updated)))
}

/// Deletes resource and its mirror file
#[utoipa::path(
    delete,
    path = "/resources/{name}",
    responses(
        (status = 204, description = "Resource deleted"),
        (status = 404, description = "Resource not found", body = ErrorReply)
    ),
    tag = "resources",
    params(
        ("name" = String, Path, description = "Resource name")
    ),
)]
pub async fn delete_resource(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ResourceError> {
    execute(&state, move |service| service.delete(&name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rewrites mirror files that are missing or out of date
#[utoipa::path(
    post,
    path = "/repair",
    responses(
        (status = 200, body = RepairReport),
    ),
    tag = "maintenance",
)]
pub async fn repair(State(state): State<AppState>) -> Result<impl IntoResponse, ResourceError> {
    let report = execute(&state, |service| service.repair()).await?;
    tracing::info!(
        "repair: checked {} rewritten {} failed {}",
        report.checked,
        report.rewritten,
        report.failed
    );
    Ok(Json(report))
}

pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Runs `action` on the blocking pool. A result that does not arrive within the
/// configured timeout is reported as `Unavailable`; the operation itself keeps
/// running to completion.
async fn execute<F, R>(state: &AppState, action: F) -> Result<R, ResourceError>
where
    F: FnOnce(&Service) -> Result<R, ResourceError> + Send + 'static,
    R: Send + 'static,
{
    let start = Instant::now();
    let service = Arc::clone(&state.service);
    let task = tokio::task::spawn_blocking(move || action(&service));
    let result = match tokio::time::timeout(state.timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ResourceError::Internal {
            op: "worker",
            detail: e.to_string(),
        }),
        Err(_) => Err(ResourceError::Unavailable {
            op: "request",
            detail: format!("no result within {:?}", state.timeout),
        }),
    };
    tracing::info!("DB query time: {:?}", start.elapsed());
    result
}

fn decode(content: &str) -> Result<Vec<u8>, ResourceError> {
    kernel::decode_content(content).map_err(|e| ResourceError::InvalidContent(e.to_string()))
}
