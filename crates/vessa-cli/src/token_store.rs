//! Bearer token persistence between CLI runs.
//!
//! Only the session token is written. API key secrets are printed once
//! and never stored.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use vessa_core::error::AppError;
use vessa_core::result::AppResult;

/// Read the saved token, `None` when there is none.
pub async fn load(path: &Path) -> AppResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let token = contents.trim();
            Ok((!token.is_empty()).then(|| token.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::with_source(
            vessa_core::ErrorKind::Configuration,
            format!("Cannot read session file {}", path.display()),
            e,
        )),
    }
}

/// Save `token`, readable by the current user only.
pub async fn save(path: &Path, token: &str) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::internal(format!("Cannot create {}: {e}", parent.display()))
        })?;
    }
    let write_error =
        |e: std::io::Error| AppError::internal(format!("Cannot write {}: {e}", path.display()));

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await.map_err(write_error)?;

    // An existing file keeps its old mode on open.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| AppError::internal(format!("Cannot restrict {}: {e}", path.display())))?;
    }

    file.write_all(token.as_bytes()).await.map_err(write_error)?;
    file.flush().await.map_err(write_error)?;
    Ok(())
}

/// Delete the saved token if present.
pub async fn remove(path: &Path) -> AppResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::internal(format!(
            "Cannot remove {}: {e}",
            path.display()
        ))),
    }
}
