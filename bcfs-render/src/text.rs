use std::path::Path;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

/// Loads a TrueType/OpenType font from disk.
pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Rasterises a single line of text into a tightly cropped, transparent
/// pixmap. `None` when nothing in `text` has an outline.
pub fn render_text_pixmap<F: Font>(text: &str, font_size: f32, font: &F, color: Color) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = w as usize;
    let dst = pm.pixels_mut();
    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Porter-Duff over in premultiplied space
            let a = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let inv = 1.0 - a;
            let bg = dst[i];
            let blended = PremultipliedColorU8::from_rgba(
                ((cu[0] as f32 * a) as u8).saturating_add((bg.red() as f32 * inv) as u8),
                ((cu[1] as f32 * a) as u8).saturating_add((bg.green() as f32 * inv) as u8),
                ((cu[2] as f32 * a) as u8).saturating_add((bg.blue() as f32 * inv) as u8),
                sa.saturating_add((bg.alpha() as f32 * inv) as u8),
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}
