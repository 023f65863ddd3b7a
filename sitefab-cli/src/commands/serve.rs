//! Static file server for previewing a build.

use anyhow::{Context, Result};
use axum::Router;
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Serve `destination` under `mount` on localhost until interrupted
pub async fn serve(destination: &Path, mount: &str, port: u16) -> Result<()> {
    let mount = normalize_mount(mount);
    let app = router(destination, &mount);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(
        "Serving {} at http://localhost:{}{}",
        destination.display(),
        port,
        mount
    );
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn router(destination: &Path, mount: &str) -> Router {
    let files = ServeDir::new(destination);
    let router = if mount == "/" {
        // nest_service cannot take the root path
        Router::new().fallback_service(files)
    } else {
        Router::new().nest_service(mount, files)
    };
    router.layer(TraceLayer::new_for_http())
}

/// Mount path with a leading slash and no trailing slash (root stays `/`)
fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mount() {
        assert_eq!(normalize_mount("/"), "/");
        assert_eq!(normalize_mount(""), "/");
        assert_eq!(normalize_mount("blog"), "/blog");
        assert_eq!(normalize_mount("/blog/"), "/blog");
        assert_eq!(normalize_mount("/a/b"), "/a/b");
    }
}
