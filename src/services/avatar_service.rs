use tracing::info;
use uuid::Uuid;

use crate::{dao::object_store::StoredObject, error::ServiceError, state::SharedState};

/// Bucket holding uploaded player avatars.
pub const AVATAR_BUCKET: &str = "avatars";
/// Largest accepted avatar upload.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Store an uploaded image and return its public URL.
pub async fn upload_avatar(
    state: &SharedState,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<String, ServiceError> {
    let content_type = content_type
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
        .filter(|value| value.starts_with("image/"))
        .ok_or_else(|| ServiceError::Validation("avatar must be an image".into()))?;
    let extension = extension_for(&content_type).ok_or_else(|| {
        ServiceError::Validation(format!("unsupported avatar format `{content_type}`"))
    })?;
    if bytes.is_empty() {
        return Err(ServiceError::Validation("avatar upload is empty".into()));
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(ServiceError::Validation(format!(
            "avatar exceeds {} bytes",
            MAX_AVATAR_BYTES
        )));
    }

    let key = format!("{}.{}", Uuid::new_v4().simple(), extension);
    let size = bytes.len();
    let store = state.object_store().clone();
    let locator = store
        .upload(AVATAR_BUCKET, &key, content_type, bytes)
        .await?;
    info!(%locator, size, "avatar uploaded");
    Ok(store.public_url(AVATAR_BUCKET, &key))
}

/// Load a previously uploaded avatar.
pub async fn fetch_avatar(state: &SharedState, key: &str) -> Result<StoredObject, ServiceError> {
    state
        .object_store()
        .fetch(AVATAR_BUCKET, key)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("avatar {key}")))
}

/// Raster formats only: scriptable images such as SVG are refused.
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryGateway, object_store::MemoryObjectStore},
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::with_gateway(
            AppConfig::default(),
            Arc::new(MemoryGateway::seeded()),
            Arc::new(MemoryObjectStore::new("http://localhost:8080")),
        )
    }

    #[tokio::test]
    async fn image_uploads_get_a_public_url() {
        let state = state();
        let url = upload_avatar(&state, Some("image/png"), vec![0x89, b'P', b'N', b'G'])
            .await
            .unwrap();
        let key = url.rsplit('/').next().unwrap().to_owned();
        assert!(url.starts_with("http://localhost:8080/avatars/"));
        assert!(key.ends_with(".png"));

        let stored = fetch_avatar(&state, &key).await.unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.bytes.len(), 4);
    }

    #[tokio::test]
    async fn non_images_and_oversized_files_are_rejected() {
        let state = state();
        assert!(matches!(
            upload_avatar(&state, Some("text/plain"), vec![1]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            upload_avatar(&state, None, vec![1]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            upload_avatar(&state, Some("image/jpeg"), vec![0; MAX_AVATAR_BYTES + 1]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            upload_avatar(&state, Some("image/svg+xml"), b"<svg/>".to_vec()).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(
            upload_avatar(&state, Some("image/jpeg; charset=binary"), vec![0; MAX_AVATAR_BYTES])
                .await
                .is_ok()
        );
    }
}
