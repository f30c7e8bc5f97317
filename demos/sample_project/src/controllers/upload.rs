use routebind::context::AbortSignal;
use routebind::dispatcher::{Handler, HandlerResponse, IntoHandlerResponse, Json};

use crate::models::UploadResult;
use crate::requests::UploadFileRequest;

pub struct UploadFileController;

impl Handler for UploadFileController {
    type Request = UploadFileRequest;
    type Response = HandlerResponse;

    fn handle(&self, req: UploadFileRequest, _signal: &AbortSignal) -> HandlerResponse {
        let Some(file) = req.file else {
            return HandlerResponse::error(400, "no file uploaded");
        };
        Json(UploadResult {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            size: file.len(),
            description: req.description,
        })
        .into_handler_response()
    }
}
