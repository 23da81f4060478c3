//! HTTP surface: the attendance form on `/`.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use rollcall_attendance::Upload;
use std::path::Path;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::engine::EngineHandle;
use crate::form::{self, FormInput, FormState, MISSING_INPUTS_WARNING};
use crate::page;

/// Shared handler state.
pub struct AppState {
    pub engine: EngineHandle,
}

/// Request error rendered as a 500 page.
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", self.0)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Multipart body of a form submission.
#[derive(TryFromMultipart)]
pub struct SubmitRequest {
    pub gallery_path: Option<String>,
    #[form_data(limit = "unlimited")]
    pub images: Vec<FieldData<Bytes>>,
}

pub fn create_app(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler).post(submit_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

async fn index_handler() -> Html<String> {
    Html(page::render(
        &FormState::Idle {
            warning: MISSING_INPUTS_WARNING,
        },
        "",
        &[],
    ))
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(request): TypedMultipart<SubmitRequest>,
) -> Result<Html<String>, AppError> {
    let gallery_path = request.gallery_path.unwrap_or_default();
    let (uploads, notices) = accept_uploads(
        request
            .images
            .into_iter()
            .map(|field| (field.metadata.file_name.unwrap_or_default(), field.contents)),
    );

    let input = FormInput {
        gallery_path: gallery_path.clone(),
        uploads,
    };
    let state = form::submit(&state.engine, input).await?;

    Ok(Html(page::render(&state, &gallery_path, &notices)))
}

/// Keep `.jpg`/`.jpeg`/`.png` files; describe the rest as notices.
///
/// An empty, nameless part is what browsers send when no file was chosen.
fn accept_uploads<I>(parts: I) -> (Vec<Upload>, Vec<String>)
where
    I: IntoIterator<Item = (String, Bytes)>,
{
    let mut uploads = Vec::new();
    let mut notices = Vec::new();

    for (file_name, contents) in parts {
        if file_name.is_empty() && contents.is_empty() {
            continue;
        }
        if !rollcall_core::has_image_extension(Path::new(&file_name)) {
            tracing::info!(file = %file_name, "dropping upload with unsupported extension");
            notices.push(format!(
                "Skipped {file_name}: only .jpg, .jpeg and .png files are accepted."
            ));
            continue;
        }
        uploads.push(Upload {
            file_name,
            bytes: contents.to_vec(),
        });
    }

    (uploads, notices)
}
