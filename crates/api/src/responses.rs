use serde::{Deserialize, Serialize};

pub use streamvault_store::{CompletedUpload, PartUploadUrl};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadResponse {
    pub upload_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlsRequest {
    pub file_name: String,
    pub upload_id: String,
    pub part_numbers: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartUrlsResponse {
    pub urls: Vec<PartUploadUrl>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_number: u32,
    pub e_tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub file_name: String,
    pub upload_id: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub success: bool,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortUploadRequest {
    pub file_name: String,
    pub upload_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortUploadResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    pub videos: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_request_uses_the_wire_field_names() {
        let request: CompleteUploadRequest = serde_json::from_str(
            r#"{
                "fileName": "clip.mp4",
                "uploadId": "abc",
                "parts": [{"partNumber": 1, "eTag": "\"p1\""}]
            }"#,
        )
        .unwrap();

        assert_eq!(request.file_name, "clip.mp4");
        assert_eq!(request.parts[0].part_number, 1);
        assert_eq!(request.parts[0].e_tag, "\"p1\"");
    }

    #[test]
    fn start_response_serializes_upload_id_in_camel_case() {
        let response = StartUploadResponse {
            upload_id: "abc".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["uploadId"], "abc");
    }
}
