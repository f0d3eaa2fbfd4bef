use std::net::SocketAddr;

pub mod error;
pub mod handler;
pub mod init_log;
pub mod metrics;
pub mod util;
type DynError = Box<dyn std::error::Error + Send + Sync>;
use crate::util::{format::SocketAddrFormat, io::create_dual_stack_listener};

use axum::{Router, extract::Request};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use log::{info, warn};
use tokio::sync::mpsc;
use tower::Service;

pub struct Server {
    pub port: u16,
    router: Router,
    shutdown_rx: mpsc::Receiver<()>,
}

pub fn new_server(port: u16, router: Router) -> (Server, mpsc::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let server = Server { port, router, shutdown_rx };
    (server, shutdown_tx)
}

impl Server {
    pub async fn run(mut self) -> Result<(), std::io::Error> {
        let listener = create_dual_stack_listener(self.port).await?;
        info!("listening on port {}", self.port);
        let server: hyper_util::server::conn::auto::Builder<TokioExecutor> = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("shutdown requested, stop accepting");
                    drop(listener);
                    break;
                }
                conn = listener.accept() => {
                    match conn {
                        Ok((conn, client_socket_addr)) => {
                            handle_connection(conn, client_socket_addr, self.router.clone(), server.clone());
                        }
                        Err(e) => {
                            warn!("accept error:{e}");
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn handle_connection<C>(conn: C, client_socket_addr: SocketAddr, app: Router, server: hyper_util::server::conn::auto::Builder<TokioExecutor>)
where
    C: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let stream = TokioIo::new(conn);
    // https://github.com/tokio-rs/axum/blob/main/examples/serve-with-hyper/src/main.rs#L81
    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| app.clone().call(request));

    let conn = server.serve_connection_with_upgrades(stream, hyper_service).into_owned();
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            handle_hyper_error(client_socket_addr, err);
        }
        log::debug!("connection dropped: {client_socket_addr}");
    });
}

fn handle_hyper_error(client_socket_addr: SocketAddr, http_err: DynError) {
    use std::error::Error;
    match http_err.downcast_ref::<hyper::Error>() {
        Some(hyper_err) => {
            let level = if hyper_err.is_user() { log::Level::Warn } else { log::Level::Debug };
            let source = hyper_err.source().unwrap_or(hyper_err);
            log::log!(
                level,
                "[hyper {}]: {:?} from {}",
                if hyper_err.is_user() { "user" } else { "system" },
                source,
                SocketAddrFormat(&client_socket_addr)
            );
        }
        None => match http_err.downcast_ref::<std::io::Error>() {
            Some(io_err) => {
                warn!("[hyper io]: [{}] {} from {}", io_err.kind(), io_err, SocketAddrFormat(&client_socket_addr));
            }
            None => {
                warn!("[hyper]: {} from {}", http_err, SocketAddrFormat(&client_socket_addr));
            }
        },
    }
}

#[cfg(unix)]
pub async fn wait_signal() -> Result<(), DynError> {
    use log::info;
    use tokio::signal::unix::{SignalKind, signal};
    let mut terminate_signal = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = terminate_signal.recv() => {
            info!("receive terminate signal");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("receive ctrl_c signal");
        },
    };
    Ok(())
}

#[cfg(windows)]
pub async fn wait_signal() -> Result<(), DynError> {
    let _ = tokio::signal::ctrl_c().await;
    info!("receive ctrl_c signal");
    Ok(())
}
