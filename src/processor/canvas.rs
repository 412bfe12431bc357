use std::str::FromStr;
use std::sync::Arc;

use image::{imageops, DynamicImage, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use crate::pipelines::{CanvasSpec, TextLabel};

/// Families tried, in order, for the generic `sans-serif` family.
const SANS_SERIF_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
];

/// Loading the system fonts is slow, it happens once per process.
static FONTS: Lazy<Arc<fontdb::Database>> = Lazy::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = sans_serif_family(&db) {
        debug!("Loaded {} font faces, sans-serif is {:?}", db.len(), &family);
        db.set_sans_serif_family(family);
    } else {
        warn!("No system fonts were found, text labels cannot be rendered");
    }

    Arc::new(db)
});

/// Picks a family that is actually installed, falling back to the first one loaded.
fn sans_serif_family(db: &fontdb::Database) -> Option<String> {
    let installed = |name: &str| {
        db.faces()
            .any(|face| face.families.iter().any(|(family, _)| family == name))
    };

    if let Some(family) = SANS_SERIF_FAMILIES.iter().find(|name| installed(name)) {
        return Some(family.to_string());
    }

    db.faces()
        .find_map(|face| face.families.first().map(|(family, _)| family.clone()))
}

/// Parses any CSS colour, e.g. `#fff`, `#336699cc`, `rgb(1, 2, 3)` or `teal`.
pub fn parse_color(value: &str) -> anyhow::Result<Rgba<u8>> {
    let color = svgtypes::Color::from_str(value.trim())
        .map_err(|e| anyhow::anyhow!("invalid colour {:?}: {}", value, e))?;

    Ok(Rgba([color.red, color.green, color.blue, color.alpha]))
}

/// Renders a square canvas filled with the background colour
/// with the label, if any, drawn centred on top.
pub fn render_canvas(spec: &CanvasSpec) -> anyhow::Result<DynamicImage> {
    let background = parse_color(&spec.background)?;
    let mut canvas = RgbaImage::from_pixel(spec.size, spec.size, background);

    if let Some(label) = spec.label.as_ref() {
        let overlay = render_label(label, spec.size)?;
        imageops::overlay(&mut canvas, &overlay, 0, 0);
    }

    Ok(DynamicImage::ImageRgba8(canvas))
}

fn render_label(label: &TextLabel, size: u32) -> anyhow::Result<RgbaImage> {
    // Validate here so a bad colour fails the request instead of being
    // silently dropped by the SVG parser.
    parse_color(&label.color)?;

    if FONTS.is_empty() {
        return Err(anyhow::anyhow!("no fonts are installed to render {:?}", &label.text));
    }

    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}"><text x="50%" y="50%" font-family="sans-serif" font-size="{font_size}" fill="{color}" text-anchor="middle" dominant-baseline="middle">{text}</text></svg>"#,
        size = size,
        font_size = label.font_size,
        color = escape_xml(&label.color),
        text = escape_xml(&label.text),
    );

    let options = usvg::Options {
        fontdb: FONTS.clone(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &options)?;

    let mut pixmap = Pixmap::new(size, size)
        .ok_or_else(|| anyhow::anyhow!("cannot allocate a {}x{} pixmap", size, size))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut out = RgbaImage::new(size, size);
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }

    Ok(out)
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
