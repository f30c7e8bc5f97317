use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::warn;

use super::request::parse_request;
use super::response::{write_handler_response, write_json_error};
use crate::app::RouteBindApp;
use crate::context::AbortSignal;

/// `may_minihttp` service running every request through a [`RouteBindApp`].
///
/// `GET /health` is answered here without touching the app.
#[derive(Clone, Debug)]
pub struct AppService {
    pub app: Arc<RouteBindApp>,
}

impl AppService {
    #[must_use]
    pub fn new(app: RouteBindApp) -> Self {
        Self { app: Arc::new(app) }
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
pub fn health_endpoint(res: &mut Response) -> io::Result<()> {
    res.status_code(200, "OK");
    res.header("Content-Type: application/json");
    res.body_vec(json!({ "status": "ok" }).to_string().into_bytes());
    Ok(())
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        if req.method() == "GET" && req.path() == "/health" {
            return health_endpoint(res);
        }

        let mut request = match parse_request(req) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to parse request");
                write_json_error(res, 400, json!({ "error": "Bad Request", "message": e.to_string() }));
                return Ok(());
            }
        };

        // may_minihttp does not report client disconnects, so the signal only trips
        // when something in the pipeline aborts it.
        let response = self.app.handle(&mut request, AbortSignal::new());
        write_handler_response(res, response);
        Ok(())
    }
}
