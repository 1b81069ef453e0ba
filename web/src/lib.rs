#![deny(missing_docs)]

//! # RestPlus Web Library
//!
//! Serves the compiled Swagger document of an [`Api`] over HTTP.

use actix_web::{get, web, HttpResponse, Responder};
use restplus_core::Api;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;

/// Shared registry. Compilation caches inside the [`Api`], hence the lock.
pub type SharedApi = web::Data<Mutex<Api>>;

/// Query string of the swagger endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SwaggerQuery {
    /// Include internal namespaces when it starts with `true`.
    pub internal: Option<String>,
}

/// A simple health check handler.
#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

fn respond(api: &Mutex<Api>, internal: Option<&str>) -> HttpResponse {
    let mut api = match api.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match api.serve_swagger(internal) {
        Ok(doc) => HttpResponse::Ok().json(&*doc),
        Err(err) => {
            tracing::error!(%err, "swagger compilation failed");
            HttpResponse::InternalServerError().json(json!({ "message": err.to_string() }))
        }
    }
}

/// `GET {swagger_path}?internal=...`
pub async fn swagger(api: SharedApi, query: web::Query<SwaggerQuery>) -> HttpResponse {
    respond(&api, query.internal.as_deref())
}

/// `GET {swagger_path}/{internal}`
pub async fn swagger_with_flag(api: SharedApi, internal: web::Path<String>) -> HttpResponse {
    respond(&api, Some(internal.as_str()))
}

/// Registers the health check and the swagger routes at `swagger_path`.
pub fn configure(cfg: &mut web::ServiceConfig, swagger_path: &str) {
    let flagged = format!("{}/{{internal}}", swagger_path.trim_end_matches('/'));
    cfg.service(health_check)
        .route(swagger_path, web::get().to(swagger))
        .route(&flagged, web::get().to(swagger_with_flag));
}
