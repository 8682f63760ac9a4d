//! The to-do app served in-process on a free loopback port for the duration of a run.

use crate::wait::Poller;
use anyhow::Result;
use rocket::{Ignite, Rocket, Shutdown};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use thiserror::Error;
use tokio::{net::TcpStream, task::JoinHandle};
use tracing::info;

#[derive(Debug, Error)]
pub enum LiveServerError {
    #[error("no free port on the loopback interface: {0}")]
    NoFreePort(#[source] std::io::Error),
    #[error("live server failed: {0}")]
    Launch(String),
    #[error("live server at {addr} never accepted connections: {cause}")]
    NotReady {
        addr: SocketAddr,
        cause: anyhow::Error,
    },
}

pub struct LiveServer {
    url: String,
    shutdown: Shutdown,
    task: JoinHandle<Result<Rocket<Ignite>, rocket::Error>>,
}

impl LiveServer {
    /// Starts a fresh app, with no lists, and waits until it accepts connections.
    pub async fn start(poller: &Poller) -> Result<Self> {
        let port = free_port()?;
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let figment = rocket::Config::figment()
            .merge(("address", addr.ip()))
            .merge(("port", port))
            .merge(("log_level", "off"));

        let rocket = todo_web::build(figment)
            .ignite()
            .await
            .map_err(LiveServerError::launch)?;
        let shutdown = rocket.shutdown();
        let task = tokio::spawn(rocket.launch());

        poller
            .until(move || async move {
                TcpStream::connect(addr).await?;
                Ok(())
            })
            .await
            .map_err(|cause| LiveServerError::NotReady { addr, cause })?;

        let url = format!("http://{}", addr);
        info!(%url, "live server started");
        Ok(LiveServer {
            url,
            shutdown,
            task,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn stop(self) -> Result<()> {
        self.shutdown.notify();
        self.task.await?.map_err(LiveServerError::launch)?;
        info!(url = %self.url, "live server stopped");
        Ok(())
    }
}

impl LiveServerError {
    // Rocket panics when an error is dropped without having been formatted.
    fn launch(err: rocket::Error) -> Self {
        LiveServerError::Launch(err.to_string())
    }
}

fn free_port() -> Result<u16, LiveServerError> {
    let listener =
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(LiveServerError::NoFreePort)?;
    let port = listener
        .local_addr()
        .map_err(LiveServerError::NoFreePort)?
        .port();
    Ok(port)
}
