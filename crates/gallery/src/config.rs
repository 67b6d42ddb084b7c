use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Serves the generated images and their thumbnails over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "comfymcp-gallery", version, about = "Browse generated images")]
pub struct GalleryConfig {
    /// Directory containing the PNG files to serve.
    #[arg(long, env = "OUTPUT_DIR", value_name = "PATH", default_value = "output")]
    pub output_dir: PathBuf,

    /// Bind address.
    #[arg(long, env = "GALLERY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Bind port.
    #[arg(long, env = "GALLERY_PORT", default_value_t = 8081)]
    pub port: u16,
}

impl GalleryConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
