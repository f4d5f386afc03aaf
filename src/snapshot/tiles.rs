use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::RgbaImage;

const USER_AGENT: &str = concat!("travel-overlay/", env!("CARGO_PKG_VERSION"));

/// One decoded 256×256 raster tile.
#[derive(Debug, Clone)]
pub struct Tile {
    pub image: RgbaImage,
    /// The pixels may be shown but not read back into an export.
    pub tainted: bool,
}

/// Where map tiles come from. `x`/`y` are already wrapped into range.
pub trait TileProvider: Send + Sync + 'static {
    fn fetch_tile(&self, z: u32, x: u32, y: u32) -> impl Future<Output = Result<Tile>> + Send;
}

/// Fetches `{z}/{x}/{y}` templated PNG tiles over HTTP.
pub struct HttpTileProvider {
    http: reqwest::Client,
    template: String,
}

impl HttpTileProvider {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !(template.contains("{z}") && template.contains("{x}") && template.contains("{y}")) {
            bail!("tile template must contain {{z}}, {{x}} and {{y}}: {template}");
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build tile HTTP client")?;

        Ok(Self { http, template })
    }

    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> String {
        self.template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{r}", "")
    }
}

impl TileProvider for HttpTileProvider {
    fn fetch_tile(&self, z: u32, x: u32, y: u32) -> impl Future<Output = Result<Tile>> + Send {
        let url = self.tile_url(z, x, y);
        async move {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .with_context(|| format!("tile request failed: {url}"))?
                .error_for_status()
                .with_context(|| format!("tile server rejected {url}"))?;

            let bytes = response
                .bytes()
                .await
                .with_context(|| format!("failed to read tile body: {url}"))?;

            let image = image::load_from_memory(&bytes)
                .with_context(|| format!("failed to decode tile: {url}"))?
                .to_rgba8();

            Ok(Tile {
                image,
                tainted: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_is_filled_in() {
        let provider =
            HttpTileProvider::new("https://tiles.example.org/{z}/{x}/{y}{r}.png").unwrap();
        assert_eq!(
            provider.tile_url(10, 571, 335),
            "https://tiles.example.org/10/571/335.png"
        );
    }

    #[test]
    fn template_without_placeholders_is_rejected() {
        assert!(HttpTileProvider::new("https://tiles.example.org/static.png").is_err());
    }
}
