use axum::response::IntoResponse;

/// Service banner for `/`.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn root_serves_the_banner() -> Result<()> {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await?;
        assert!(body.starts_with(b"aliro "));
        Ok(())
    }
}
