use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kernel::Resource;
use utoipa::{
    openapi::{
        self,
        content::Content,
        response::ResponseBuilder,
        schema::{KnownFormat, ObjectBuilder, SchemaFormat, Type},
        RefOr,
    },
    ToResponse,
};

use crate::domain::StoredResource;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

impl From<StoredResource> for Resource {
    fn from(r: StoredResource) -> Self {
        Self {
            id: r.id,
            name: r.name,
            content: kernel::encode_content(&r.content),
            content_type: r.content_type,
            size: r.content.len(),
            blake3_hash: r.blake3_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
            warning: None,
        }
    }
}

/// Resource JSON for a change whose mirror write failed after the row was committed.
pub(crate) fn with_warning(resource: StoredResource, reason: String) -> (StatusCode, Json<Resource>) {
    let mut reply = Resource::from(resource);
    reply.warning = Some(format!("filesystem mirror is stale: {reason}"));
    (StatusCode::OK, Json(reply))
}

/// Raw payload of a resource served with its declared content type.
pub struct ContentReply {
    resource: StoredResource,
}

impl ContentReply {
    #[must_use]
    pub fn new(resource: StoredResource) -> Self {
        Self { resource }
    }

    fn content_type(&self) -> HeaderValue {
        HeaderValue::from_str(&self.resource.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE))
    }
}

impl IntoResponse for ContentReply {
    fn into_response(self) -> Response {
        let content_type = self.content_type();
        let etag = format!(r#""{}""#, self.resource.blake3_hash);
        let mut res = Body::from(self.resource.content).into_response();
        res.headers_mut().insert(header::CONTENT_TYPE, content_type);
        if let Ok(val) = HeaderValue::from_str(&etag) {
            res.headers_mut().insert(header::ETAG, val);
        }
        res
    }
}

impl ToResponse<'static> for ContentReply {
    fn response() -> (&'static str, RefOr<openapi::Response>) {
        let object = ObjectBuilder::new()
            .schema_type(Type::String)
            .format(Some(SchemaFormat::KnownFormat(KnownFormat::Binary)))
            .build();
        let content = Content::new(Some(object));
        (
            "ContentReply",
            ResponseBuilder::new()
                .description("Resource payload with its declared content type")
                .content("*/*", content)
                .build()
                .into(),
        )
    }
}
