//! HTTP handler for crash report uploads.
//!
//! The front door validates the request shape, delegates persistence to
//! `ReportStore`, and hands the fresh identifier to the pipeline. Every
//! rejection happens before any artifact is written.

use crate::{AppState, errors::AppError};
use axum::{
    extract::{
        State,
        multipart::{Multipart, MultipartRejection},
    },
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::error;

/// Multipart field carrying the raw minidump bytes.
const MINIDUMP_FIELD: &str = "upload_file_minidump";

/// `POST /upload` (registered for every method so that non-POST requests
/// get a 400, not a routing-level 405).
///
/// On success the response body is the bare report identifier; the uploader
/// gets no further notification about processing.
pub async fn upload_report(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    if method != Method::POST {
        return Err(AppError::bad_request(
            "Bad request: This endpoint only allows POST requests",
        ));
    }

    ensure_multipart_content_type(&headers)?;

    let multipart = multipart
        .map_err(|_| AppError::bad_request("Bad request: Multi-part message cannot be parsed"))?;
    let (dump, fields) = read_form(multipart).await?;

    let id = state.store.store(dump, &fields).await.map_err(|err| {
        error!("failed to store crash report: {}", err);
        AppError::internal()
    })?;

    // Waits here when 100 reports are already outstanding.
    if let Err(err) = state.pipeline.submit(id.clone()).await {
        error!("failed to queue crash report {}: {}", id, err);
        return Err(AppError::internal());
    }

    Ok((StatusCode::OK, id.to_string()).into_response())
}

/// Reject requests whose Content-Type is missing, unreadable, or not
/// multipart/form-data. Both cases are client errors with distinct messages.
fn ensure_multipart_content_type(headers: &HeaderMap) -> Result<(), AppError> {
    let value = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("Bad request: Content-Type cannot be parsed"))?;

    let media_type = value.split(';').next().unwrap_or("").trim();
    if media_type.is_empty() {
        return Err(AppError::bad_request(
            "Bad request: Content-Type cannot be parsed",
        ));
    }
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return Err(AppError::bad_request(
            "Bad request: Content-Type must be multipart/form-data",
        ));
    }
    Ok(())
}

/// Drain the multipart body into the dump payload and a field map.
///
/// Text fields keep every submitted value in order; the storage writer picks
/// the first of each recognized name. Only the first minidump part counts.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Bytes, HashMap<String, Vec<String>>), AppError> {
    let mut dump: Option<Bytes> = None;
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => {
                return Err(AppError::bad_request(
                    "Bad request: Multi-part message cannot be parsed",
                ));
            }
        };

        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        // Only a file part counts as the dump; a plain text value under the
        // same name is an ordinary form field.
        if name == MINIDUMP_FIELD && field.file_name().is_some() {
            let bytes = field.bytes().await.map_err(|_| {
                AppError::bad_request("Bad request: Multi-part message cannot be parsed")
            })?;
            if dump.is_none() {
                dump = Some(bytes);
            }
        } else {
            let value = field.text().await.map_err(|_| {
                AppError::bad_request("Bad request: Multi-part message cannot be parsed")
            })?;
            fields.entry(name).or_default().push(value);
        }
    }

    let dump = dump.ok_or_else(|| {
        AppError::bad_request("Bad request: Body must contain upload_file_minidump")
    })?;
    Ok((dump, fields))
}
