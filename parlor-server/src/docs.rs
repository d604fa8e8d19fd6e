use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::{
    serialized::{Member, Message, Reaction, Room},
    upload::{UploadForm, UploadResult},
    Health,
};

#[derive(OpenApi)]
#[openapi(
    paths(crate::health, crate::upload::upload, crate::ws::gateway),
    components(schemas(Health, UploadForm, UploadResult, Room, Member, Message, Reaction)),
    info(description = "parlor-server relays room presence, chat, and call signaling")
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let document = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = document["paths"].as_object().unwrap();

        for path in ["/health", "/upload", "/gateway"] {
            assert!(paths.contains_key(path), "{} is documented", path);
        }
    }

    #[test]
    fn test_upload_body_is_multipart() {
        let document = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let body = &document["paths"]["/upload"]["post"]["requestBody"]["content"];

        let form = &body["multipart/form-data"];
        assert!(form.is_object(), "upload body is documented as a form");
        assert_eq!(form["schema"]["$ref"], "#/components/schemas/UploadForm");
    }
}
