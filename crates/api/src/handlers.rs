use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::Response,
};

use streamvault_engine::RangeRequest;
use streamvault_session::UploadedPart;
use streamvault_store::MAX_MULTIPART_PARTS;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    responses::*,
};

pub async fn upload_start(
    State(state): State<AppState>,
    Json(request): Json<StartUploadRequest>,
) -> ApiResult<Json<StartUploadResponse>> {
    if request.file_name.is_empty() {
        return Err(ApiError::BadRequest("fileName must not be empty".into()));
    }

    let content_type = if request.content_type.is_empty() {
        "application/octet-stream"
    } else {
        &request.content_type
    };

    let upload_id = state
        .gateway
        .create_upload(&request.file_name, content_type)
        .await?;

    Ok(Json(StartUploadResponse { upload_id }))
}

pub async fn upload_presigned_urls(
    State(state): State<AppState>,
    Json(request): Json<PartUrlsRequest>,
) -> ApiResult<Json<PartUrlsResponse>> {
    if request.part_numbers.is_empty() {
        return Err(ApiError::BadRequest("partNumbers must not be empty".into()));
    }
    if request
        .part_numbers
        .iter()
        .any(|&n| n == 0 || n > MAX_MULTIPART_PARTS)
    {
        return Err(ApiError::BadRequest(format!(
            "part numbers must lie in 1..={MAX_MULTIPART_PARTS}"
        )));
    }

    let urls = state
        .gateway
        .part_upload_urls(
            &request.file_name,
            &request.upload_id,
            &request.part_numbers,
        )
        .await?;

    Ok(Json(PartUrlsResponse { urls }))
}

pub async fn upload_complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteUploadRequest>,
) -> ApiResult<Json<CompleteUploadResponse>> {
    if request.parts.is_empty() {
        return Err(ApiError::BadRequest("parts must not be empty".into()));
    }

    let parts: Vec<UploadedPart> = request
        .parts
        .iter()
        .map(|part| UploadedPart {
            part_number: part.part_number,
            etag: part.e_tag.clone(),
        })
        .collect();

    let completed = state
        .gateway
        .complete_upload(&request.file_name, &request.upload_id, &parts)
        .await?;

    Ok(Json(CompleteUploadResponse {
        success: true,
        location: completed.location,
    }))
}

pub async fn upload_abort(
    State(state): State<AppState>,
    Json(request): Json<AbortUploadRequest>,
) -> ApiResult<Json<AbortUploadResponse>> {
    state
        .gateway
        .abort_upload(&request.file_name, &request.upload_id)
        .await?;

    Ok(Json(AbortUploadResponse { success: true }))
}

pub async fn list_videos(State(state): State<AppState>) -> Json<VideoListResponse> {
    Json(VideoListResponse {
        videos: state.registry.ids(),
    })
}

/// Serves a configured video, honoring a single `bytes=start-end` range.
/// Malformed or multi-span ranges are ignored and answered with the full
/// resource, per RFC 9110. HEAD gets the same headers with no body.
pub async fn stream_video(
    Path(id): Path<String>,
    method: Method,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let source = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::VideoNotFound(id.clone()))?;

    let metadata = state
        .backend
        .probe(source)
        .await
        .map_err(|err| ApiError::from_backend(&id, err))?;

    if method == Method::HEAD {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, metadata.content_type)
            .header(header::CONTENT_LENGTH, metadata.content_length.to_string())
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::empty())
            .unwrap());
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range_header);

    if let Some(range) = range {
        let resolved = range
            .resolve(metadata.content_length)
            .map_err(|err| ApiError::RangeNotSatisfiable { size: err.size })?;

        let stream = state
            .backend
            .open_range(source, resolved.start, resolved.end)
            .await
            .map_err(|err| ApiError::from_backend(&id, err))?;

        return Ok(Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, metadata.content_type)
            .header(header::CONTENT_LENGTH, resolved.length().to_string())
            .header(
                header::CONTENT_RANGE,
                format!(
                    "bytes {}-{}/{}",
                    resolved.start, resolved.end, resolved.total_size
                ),
            )
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(stream))
            .unwrap());
    }

    if metadata.content_length == 0 {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, metadata.content_type)
            .header(header::CONTENT_LENGTH, "0")
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::empty())
            .unwrap());
    }

    let stream = state
        .backend
        .open_range(source, 0, metadata.content_length - 1)
        .await
        .map_err(|err| ApiError::from_backend(&id, err))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, metadata.content_type)
        .header(header::CONTENT_LENGTH, metadata.content_length.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(stream))
        .unwrap())
}

/// Parses `Range: bytes=start-end` where `end` may be omitted. Anything
/// else (suffix ranges, multiple spans, garbage) yields `None` so the
/// caller falls back to a full response.
fn parse_range_header(value: &str) -> Option<RangeRequest> {
    let spec = value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let start = start.parse::<u64>().ok()?;
    let end = match end {
        "" => None,
        raw => Some(raw.parse::<u64>().ok()?),
    };

    Some(RangeRequest::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_range_parses() {
        assert_eq!(
            parse_range_header("bytes=0-499"),
            Some(RangeRequest::new(0, Some(499)))
        );
    }

    #[test]
    fn open_ended_range_parses() {
        assert_eq!(
            parse_range_header("bytes=500-"),
            Some(RangeRequest::new(500, None))
        );
    }

    #[test]
    fn inverted_range_still_parses_and_fails_later_resolution() {
        // 416 is decided by resolution against the size, not by the parser.
        assert_eq!(
            parse_range_header("bytes=500-100"),
            Some(RangeRequest::new(500, Some(100)))
        );
    }

    #[test]
    fn suffix_range_is_rejected() {
        assert_eq!(parse_range_header("bytes=-500"), None);
    }

    #[test]
    fn multiple_spans_are_rejected() {
        assert_eq!(parse_range_header("bytes=0-1,5-9"), None);
    }

    #[test]
    fn wrong_unit_is_rejected() {
        assert_eq!(parse_range_header("items=0-499"), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_range_header("bytes=abc-def"), None);
        assert_eq!(parse_range_header("bytes="), None);
        assert_eq!(parse_range_header(""), None);
    }
}
