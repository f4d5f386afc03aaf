use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use travel_overlay_lib::{
    init_logging, HttpTileProvider, RasterMapEngine, RoutePoint, SettingsStore,
    SnapshotGenerator, SnapshotOptions, SnapshotResult,
};

const USAGE: &str = "usage: route-snapshot <points.json> <out.png> [width height zoom]";
const SETTINGS_ENV: &str = "TRAVEL_OVERLAY_SETTINGS";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (points_path, out_path, size) = match args.as_slice() {
        [points, out] => (points, out, None),
        [points, out, width, height, zoom] => (points, out, Some((width, height, zoom))),
        _ => bail!(USAGE),
    };

    let settings = match std::env::var_os(SETTINGS_ENV) {
        Some(path) => SettingsStore::new(PathBuf::from(path))?.snapshot(),
        None => Default::default(),
    };

    let mut options = SnapshotOptions::from(&settings);
    if let Some((width, height, zoom)) = size {
        options.width = width.parse().context("width must be a positive integer")?;
        options.height = height.parse().context("height must be a positive integer")?;
        options.zoom = zoom.parse().context("zoom must be a number")?;
    }

    let raw = std::fs::read_to_string(points_path)
        .with_context(|| format!("failed to read {points_path}"))?;
    let points: Vec<RoutePoint> =
        serde_json::from_str(&raw).with_context(|| format!("invalid points in {points_path}"))?;

    log::info!("route-snapshot: {} points from {points_path}", points.len());

    let provider = HttpTileProvider::new(settings.tile_url_template.clone())?;
    let engine = Arc::new(RasterMapEngine::new(provider));
    let generator = SnapshotGenerator::new(engine, settings);

    let image = match generator.capture(&points, options).await {
        SnapshotResult::Captured(image) => image,
        SnapshotResult::Placeholder(image) => {
            log::warn!("map could not be rendered, writing placeholder");
            image
        }
        SnapshotResult::NoSnapshot => bail!("no valid points in {points_path}"),
    };

    std::fs::write(out_path, image.png_bytes()?)
        .with_context(|| format!("failed to write {out_path}"))?;
    log::info!("wrote {}x{} snapshot to {out_path}", image.width, image.height);
    Ok(())
}
