use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTML_PORT: u16 = 50000;
pub const DEFAULT_JS_PORT: u16 = 8888;
pub const DEFAULT_DB_PATH: &str = "activity-track.db";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Everything the server needs at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// Port the pages are usually loaded from
    pub html_port: u16,
    /// Port the tracker script and ingestion endpoint are usually loaded from
    pub js_port: u16,
    pub db_path: PathBuf,
    /// Static pages; `index.html` backs `/1.html` to `/3.html`
    pub public_dir: PathBuf,
    /// Build output; the client asset is `client/tracker.js`
    pub dist_dir: PathBuf,
    pub dead_letter: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            html_port: DEFAULT_HTML_PORT,
            js_port: DEFAULT_JS_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            public_dir: PathBuf::from("public"),
            dist_dir: PathBuf::from("dist"),
            dead_letter: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Addresses to listen on. Equal ports share one listener.
    pub fn listen_addrs(&self) -> Vec<SocketAddr> {
        let mut ports = vec![self.html_port];
        if self.js_port != self.html_port {
            ports.push(self.js_port);
        }
        ports
            .into_iter()
            .map(|port| SocketAddr::new(self.host, port))
            .collect()
    }

    pub fn tracker_asset(&self) -> PathBuf {
        self.dist_dir.join("client").join("tracker.js")
    }

    pub fn index_page(&self) -> PathBuf {
        self.public_dir.join("index.html")
    }
}
