#![deny(missing_docs)]

//! # RestPlus Web Binary
//!
//! Entry point for the Actix Web server publishing the Swagger document.
//!
//! Environment:
//! - `RESTPLUS_WEB_BIND`: listen address (default `127.0.0.1:8080`).
//! - `RESTPLUS_DEFINITION`: definition file to load (an empty Api otherwise).
//! - `RESTPLUS_WEB_ONESHOT`: start then stop immediately.

use actix_web::{web, App, HttpServer};
use restplus_core::{load_api, Api};
use restplus_web::configure;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn build_server(listener: TcpListener, api: Api) -> std::io::Result<actix_web::dev::Server> {
    let swagger_path = api.swagger_path().to_string();
    let state = web::Data::new(Mutex::new(api));
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(|cfg| configure(cfg, &swagger_path))
    })
    .listen(listener)?
    .run())
}

fn resolve_bind_addr() -> String {
    std::env::var("RESTPLUS_WEB_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string())
}

fn resolve_api() -> std::io::Result<Api> {
    match std::env::var("RESTPLUS_DEFINITION") {
        Ok(path) => load_api(Path::new(&path)).map_err(|e| std::io::Error::other(e.to_string())),
        Err(_) => Ok(Api::default()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();
    let api = resolve_api()?;
    let bind_addr = resolve_bind_addr();
    let listener = TcpListener::bind(&bind_addr)?;
    tracing::info!(%bind_addr, swagger_path = api.swagger_path(), "serving swagger document");
    let server = build_server(listener, api)?;

    if std::env::var("RESTPLUS_WEB_ONESHOT").is_ok() {
        server.handle().stop(true).await;
    }

    server.await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_oneshot() {
        std::env::set_var("RESTPLUS_WEB_BIND", "127.0.0.1:0");
        std::env::set_var("RESTPLUS_WEB_ONESHOT", "1");

        let res = main();

        std::env::remove_var("RESTPLUS_WEB_BIND");
        std::env::remove_var("RESTPLUS_WEB_ONESHOT");

        assert!(res.is_ok());
    }

    #[actix_web::test]
    async fn test_build_server_start_stop() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let server = build_server(listener, Api::default()).unwrap();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        handle.stop(true).await;
    }
}
