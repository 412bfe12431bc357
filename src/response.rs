use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object};

use crate::error::ToolError;
use crate::pipelines::Tool;

/// The body of every failed request.
#[derive(Object, Debug)]
pub struct ErrorMessage {
    /// A human readable description of what went wrong.
    pub error: String,
}

#[derive(Object, Debug)]
#[oai(rename_all = "camelCase")]
pub struct ResizeResult {
    pub success: bool,
    pub file_name: String,
    /// Valid for one hour.
    pub signed_url: String,
}

#[derive(Object, Debug)]
#[oai(rename_all = "camelCase")]
pub struct BulkResizeEntry {
    /// The file name the image was uploaded with.
    pub original_name: String,
    pub resized_name: String,
    /// Valid for one hour.
    pub signed_url: String,
}

#[derive(Object, Debug)]
#[oai(rename_all = "camelCase")]
pub struct BulkResizeResult {
    pub success: bool,
    /// In the same order the files were uploaded.
    pub results: Vec<BulkResizeEntry>,
}

#[derive(Object, Debug)]
#[oai(rename_all = "camelCase")]
pub struct FileResult {
    pub success: bool,
    pub file_name: String,
}

#[derive(Object, Debug)]
#[oai(rename_all = "camelCase")]
pub struct IconSetResult {
    pub success: bool,
    pub ico_file_name: String,
    /// In the order the sizes were requested.
    pub png_file_names: Vec<String>,
}

/// Shared by every tool response so failures are answered the same way.
pub trait ToolResponse: Sized {
    fn bad_request(message: String) -> Self;

    fn internal_error(message: &str) -> Self;
}

/// Answers bodies that could not be parsed as a form at all.
pub fn bad_request_handler<T: ToolResponse>(err: poem::Error) -> T {
    debug!("Rejected unparsable request body: {}", err);
    T::bad_request("Invalid multipart form body".to_string())
}

/// Logs the failure and maps it to a generic response.
pub fn failure<T: ToolResponse>(tool: Tool, err: ToolError) -> T {
    match err {
        ToolError::Validation(message) => {
            debug!("Rejected {} request: {}", tool, &message);
            T::bad_request(message)
        },
        other => {
            error!("Failed to process {} request: {:?}", tool, other);
            T::internal_error(tool.profile().failure_message)
        },
    }
}

macro_rules! tool_response {
    ( $name:ident, $body:ty ) => {
        #[derive(ApiResponse)]
        #[oai(bad_request_handler = "bad_request_handler")]
        pub enum $name {
            /// Every artifact was generated and published.
            #[oai(status = 200)]
            Ok(Json<$body>),

            /// A required form field is missing or malformed.
            #[oai(status = 400)]
            BadRequest(Json<ErrorMessage>),

            /// The image could not be processed or published.
            #[oai(status = 500)]
            InternalError(Json<ErrorMessage>),
        }

        impl ToolResponse for $name {
            fn bad_request(message: String) -> Self {
                Self::BadRequest(Json(ErrorMessage { error: message }))
            }

            fn internal_error(message: &str) -> Self {
                Self::InternalError(Json(ErrorMessage {
                    error: message.to_string(),
                }))
            }
        }
    };
}

tool_response!(ResizeResponse, ResizeResult);
tool_response!(BulkResizeResponse, BulkResizeResult);
tool_response!(FileResponse, FileResult);
tool_response!(IconSetResponse, IconSetResult);
