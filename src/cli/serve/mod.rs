//! `serve` command: build loop plus a static file server over the target.
//!
//! The server is bound before the first round, so a busy port fails fast,
//! but requests are only answered once the first round succeeded.

mod lifecycle;
mod path;
mod response;

use crate::{
    config::{SiteConfig, cfg},
    core::{finish_signal, is_shutdown, register_server},
    engine::{BuildFn, build_loop},
    log,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Request, Server};

/// Threads answering requests.
const REQUEST_THREADS: usize = 4;

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind the HTTP server without starting the request loop
pub fn bind_server(config: &SiteConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    register_server(Arc::clone(&server));

    Ok(BoundServer { server, addr })
}

impl BoundServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the request loop on its own thread, serving `build.target` of
    /// the published config.
    pub fn spawn(&self) -> Result<JoinHandle<()>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("modulir-http-{i}"))
            .build()
            .context("failed to create request thread pool")?;
        let server = Arc::clone(&self.server);

        thread::Builder::new()
            .name("modulir-serve".into())
            .spawn(move || run_request_loop(&server, &pool))
            .context("failed to spawn request loop")
    }

    /// Stop `incoming_requests` from blocking.
    pub fn unblock(&self) {
        self.server.unblock();
    }
}

/// Run the build loop, serving the target over HTTP when enabled.
pub fn run_serve(config: &SiteConfig, build: &BuildFn) -> Result<()> {
    if !config.serve.http {
        return build_loop(config, build, &finish_signal(), || {});
    }

    let bound = bind_server(config)?;
    let mut request_loop = None;

    build_loop(config, build, &finish_signal(), || {
        match bound.spawn() {
            Ok(handle) => {
                log!("serve"; "http://{}", bound.addr());
                request_loop = Some(handle);
            }
            Err(e) => log!("serve"; "{:#}", e),
        }
    })?;

    bound.unblock();
    if let Some(handle) = request_loop
        && handle.join().is_err()
    {
        log!("serve"; "request loop panicked");
    }
    Ok(())
}

fn run_request_loop(server: &Server, pool: &rayon::ThreadPool) {
    let config = cfg();
    for request in server.incoming_requests() {
        let config = Arc::clone(&config);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &config.build.target) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, root: &Path) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    match path::resolve_path(request.url(), root) {
        Some(file) => response::respond_file(request, &file),
        None => response::respond_not_found(request, root),
    }
}
