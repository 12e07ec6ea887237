//! Request extractors: the bearer-token caller and multipart post forms.

use axum::extract::{FromRequestParts, Multipart};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domains::{DomainError, Identity, MediaUpload};

use super::error::ApiError;
use super::state::AppState;

/// The authenticated caller, from `Authorization: Bearer <access token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError(DomainError::Unauthorized("Missing bearer token.".into())))?;

        state
            .tokens
            .verify(token)
            .map(AuthUser)
            .map_err(|e| ApiError(DomainError::Unauthorized(e.message)))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Fields of the create and edit post forms.
#[derive(Debug, Default)]
pub struct PostForm {
    pub content: String,
    pub keep:    Vec<String>,
    pub files:   Vec<MediaUpload>,
}

impl PostForm {
    /// Reads `content`, any number of `keep` and `files` parts; other parts are ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "content" => form.content = field.text().await?,
                "keep" => form.keep.push(field.text().await?),
                "files" => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field
                        .content_type()
                        .and_then(|ct| ct.parse::<mime::Mime>().ok())
                        .filter(|m| *m != mime::APPLICATION_OCTET_STREAM)
                        .or_else(|| file_name.as_deref().and_then(|n| mime_guess::from_path(n).first()))
                        .unwrap_or(mime::APPLICATION_OCTET_STREAM);
                    let data = field.bytes().await?;
                    if data.is_empty() {
                        continue;
                    }
                    form.files.push(MediaUpload { file_name, content_type, data });
                }
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
