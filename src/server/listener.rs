//! Radio server listener
//!
//! Binds the socket and serves the router until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes::{self, AppState};
use crate::station::Station;

/// HTTP radio server
pub struct RadioServer {
    config: ServerConfig,
    station: Arc<Station>,
    state: AppState,
}

impl RadioServer {
    /// Create a new server for `station`
    pub fn new(config: ServerConfig, station: Arc<Station>) -> Self {
        let state = AppState::new(Arc::clone(&station), config.max_listeners);

        Self {
            config,
            station,
            state,
        }
    }

    /// Get a reference to the station
    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    /// Router serving this station; every copy shares one listener limit
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve requests from an already bound listener until `shutdown`
    /// resolves, then stop every stream
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            tracks = self.station.library().tracks().len(),
            "Radio server listening"
        );

        let cleanup_handle = self.station.spawn_cleanup_task(self.config.cleanup_interval);

        // Open bodies only finish once their streams close, so the station
        // stops before axum waits on in-flight responses.
        let station = Arc::clone(&self.station);
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                station.shutdown().await;
            })
            .await;

        cleanup_handle.abort();
        self.station.shutdown().await;

        Ok(result?)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use crate::library::catalog::tests::music_dir;
    use crate::library::{LibraryConfig, TrackLibrary};
    use crate::playback::StreamConfig;

    use super::*;

    struct TestServer {
        addr: SocketAddr,
        station: Arc<Station>,
        stop: oneshot::Sender<()>,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    async fn start(config: ServerConfig) -> TestServer {
        let dir = music_dir(&[
            ("Clair de Lune.wav", vec![7u8; 100]),
            ("Hungarian Dance No.5.wav", vec![5u8; 100]),
        ])
        .await;
        let library = TrackLibrary::open(LibraryConfig::with_dir(dir)).await.unwrap();
        let stream_config = StreamConfig::default()
            .chunk_size(10)
            .fallback_tick(Duration::from_millis(5))
            .keep_alive();
        let station = Arc::new(Station::new(library, stream_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RadioServer::new(config, Arc::clone(&station));
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve_until(listener, async {
                    let _ = stopped.await;
                })
                .await
        });

        TestServer {
            addr,
            station,
            stop,
            task,
        }
    }

    impl TestServer {
        async fn shutdown(self) {
            let _ = self.stop.send(());
            self.task.await.unwrap().unwrap();
        }
    }

    async fn request(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let raw = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        request(addr, &raw).await
    }

    fn status_line(response: &str) -> &str {
        response.lines().next().unwrap_or_default()
    }

    /// Open `/play` over HTTP/1.0 so the body is close-delimited, and read
    /// until the head and `min_body` audio bytes have arrived
    async fn open_play(addr: SocketAddr, path: &str, min_body: usize) -> (TcpStream, String, Vec<u8>) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let raw = format!("GET {} HTTP/1.0\r\nHost: localhost\r\n\r\n", path);
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early");
            received.extend_from_slice(&buf[..n]);
            if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                if received.len() >= pos + 4 + min_body {
                    let head = String::from_utf8_lossy(&received[..pos + 4]).to_ascii_lowercase();
                    let body = received[pos + 4..].to_vec();
                    return (stream, head, body);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_catalogue_endpoints() {
        let server = start(ServerConfig::default()).await;

        let index = get(server.addr, "/").await;
        assert!(status_line(&index).contains(" 200 "));
        assert!(index.contains("GET /songs"));

        let songs = get(server.addr, "/songs").await;
        assert!(status_line(&songs).contains(" 200 "));
        assert!(songs.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(songs.contains("\"title\":\"Clair de Lune\""));

        let song = get(server.addr, "/songs/hungarian%20dance").await;
        assert!(song.contains("\"id\":2"));

        let search = get(server.addr, "/search/LUNE").await;
        assert!(search.contains("\"file_type\":\"wav\""));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = start(ServerConfig::default()).await;

        let missing = get(server.addr, "/play/nocturne").await;
        assert!(status_line(&missing).contains(" 404 "));
        assert!(missing.contains("{\"message\":\"song not found\"}"));

        let unknown = get(server.addr, "/upload").await;
        assert!(status_line(&unknown).contains(" 404 "));
        assert!(unknown.contains("\"message\":\"not found\""));

        let post = request(
            server.addr,
            "POST /songs HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(status_line(&post).contains(" 405 "));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_play_streams_audio() {
        let server = start(ServerConfig::default()).await;

        let (mut stream, head, body) = open_play(server.addr, "/play/clair", 20).await;
        assert!(head.starts_with("http/1."));
        assert!(head.contains(" 200 "));
        assert!(head.contains("content-type: audio/wav\r\n"));
        assert!(head.contains("cache-control: no-cache, no-store\r\n"));
        assert!(body.iter().all(|b| *b == 7));
        assert_eq!(server.station.live_streams().await, 1);

        // Closing the station ends the body
        server.shutdown().await;
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.iter().all(|b| *b == 7));
    }

    #[tokio::test]
    async fn test_listener_limit() {
        let server = start(ServerConfig::default().max_listeners(1)).await;

        let (first, _, _) = open_play(server.addr, "/play/1", 10).await;

        let rejected = get(server.addr, "/play/2").await;
        assert!(status_line(&rejected).contains(" 503 "));
        assert!(rejected.contains("too many listeners"));

        // Catalogue requests are not limited
        let songs = get(server.addr, "/songs").await;
        assert!(status_line(&songs).contains(" 200 "));

        drop(first);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_frees_listener_slot() {
        let server = start(ServerConfig::default().max_listeners(1)).await;

        let (first, _, _) = open_play(server.addr, "/play/1", 10).await;
        drop(first);

        // The pump notices the closed body on its next write
        let mut admitted = false;
        for _ in 0..100 {
            let mut stream = TcpStream::connect(server.addr).await.unwrap();
            stream
                .write_all(b"GET /play/1 HTTP/1.0\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            if status_line(&String::from_utf8_lossy(&buf[..n])).contains(" 200 ") {
                admitted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(admitted, "listener slot was never released");

        server.shutdown().await;
    }
}
