use crate::error::AppError;
use crate::payments::{PreferenceRequest, PreferenceResponse};
use crate::router::{AppState, Request, Response};
use serde_json::json;

/// `POST /api/create-preference`: `{title, quantity, price}` → `{id}`.
pub async fn create_preference(req: Request, state: AppState) -> Response {
    let created = async {
        let request: PreferenceRequest = req.json()?;
        request.validate()?;
        state.payments.create_preference(&request).await
    }
    .await;

    match created {
        Ok(id) => Response::json(PreferenceResponse { id }, 200),
        Err(e) => {
            log::error!("Error creating preference: {}", e);
            Response::json(json!({ "error": "Error creating preference" }), 500)
        }
    }
}

/// `POST /api/upload/:bucket?folder=&filename=` with the image as the raw body.
pub async fn upload(req: Request, state: AppState) -> Response {
    let Some(user) = &req.user else {
        return Response::json_error(&AppError::Unauthorized(
            "Debes iniciar sesión para subir imágenes.".into(),
        ));
    };
    let bucket = req.param("bucket").unwrap_or_default();
    let folder = req.query_param("folder").unwrap_or("uploads");
    let filename = req.query_param("filename").unwrap_or("");
    let content_type = req.content_type().unwrap_or("application/octet-stream");

    match state
        .storage
        .upload(bucket, folder, filename, &req.body, content_type)
        .await
    {
        Ok(url) => {
            log::info!("User {} uploaded {}", user.id, url);
            Response::json(json!({ "url": url }), 200)
        }
        Err(e) => {
            log::warn!("Upload to {}/{} rejected: {}", bucket, folder, e);
            Response::json_error(&e)
        }
    }
}

/// Serve a stored upload.
pub async fn media(req: Request, state: AppState) -> Response {
    let path = req.param("path").unwrap_or_default();
    match state.storage.read(path).await {
        Ok(obj) => Response::bytes(&obj.content_type, obj.bytes)
            .with_header("Cache-Control", "public, max-age=86400"),
        Err(AppError::NotFound(_)) => Response::not_found(),
        Err(e) => {
            log::error!("Error reading media {}: {}", path, e);
            Response::server_error()
        }
    }
}
