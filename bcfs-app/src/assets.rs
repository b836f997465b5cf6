use anyhow::{Context, Result};
use bcfs_experiment::ImageSet;
use bcfs_render::pixmap_from_rgba;
use image::imageops::FilterType;
use tiny_skia::Pixmap;
use tracing::debug;

/// Decodes every image of `set`, scaled to exactly `size`.
pub fn load_pixmaps(set: &ImageSet, size: (u32, u32)) -> Result<Vec<Pixmap>> {
    let (w, h) = size;
    set.paths()
        .iter()
        .map(|path| {
            let img = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
            let rgba = img.resize_exact(w, h, FilterType::Triangle).into_rgba8();
            pixmap_from_rgba(w, h, rgba.as_raw())
                .with_context(|| format!("converting {} to a {w}x{h} pixmap", path.display()))
        })
        .collect::<Result<Vec<_>>>()
        .inspect(|pixmaps| debug!(count = pixmaps.len(), w, h, "images decoded"))
}
