//! Favicons generated from the site logo.
//!
//! The logo is decoded once and scaled to each icon size with Lanczos3, then
//! stored under fixed names next to the uploaded media.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, imageops::FilterType};

/// Maximum logo size accepted for icon generation (10 MB).
const MAX_LOGO_SIZE: usize = 10 * 1024 * 1024;

/// One generated icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaviconAsset {
    /// Storage key and public path (`/<name>`).
    pub name: &'static str,
    /// Edge length in pixels; icons are square.
    pub size: u32,
    pub format: ImageFormat,
    pub mime_type: &'static str,
}

/// The icons linked from every page when favicons are enabled.
pub const FAVICON_ASSETS: &[FaviconAsset] = &[
    FaviconAsset {
        name: "favicon.ico",
        size: 32,
        format: ImageFormat::Ico,
        mime_type: "image/x-icon",
    },
    FaviconAsset {
        name: "apple-touch-icon.png",
        size: 180,
        format: ImageFormat::Png,
        mime_type: "image/png",
    },
    FaviconAsset {
        name: "favicon.png",
        size: 300,
        format: ImageFormat::Png,
        mime_type: "image/png",
    },
];

/// Look up an icon by its public file name.
pub fn favicon_asset(name: &str) -> Option<&'static FaviconAsset> {
    FAVICON_ASSETS.iter().find(|asset| asset.name == name)
}

/// Render every icon in [`FAVICON_ASSETS`] from the logo bytes.
///
/// CPU bound; call it from a blocking task.
pub fn render_favicons(logo: &[u8]) -> Result<Vec<(&'static FaviconAsset, Vec<u8>)>> {
    if logo.len() > MAX_LOGO_SIZE {
        anyhow::bail!(
            "logo too large: {} bytes exceeds {} byte limit",
            logo.len(),
            MAX_LOGO_SIZE
        );
    }

    let img = image::load_from_memory(logo).context("failed to load logo image")?;

    FAVICON_ASSETS
        .iter()
        .map(|asset| encode_icon(&img, asset).map(|bytes| (asset, bytes)))
        .collect()
}

fn encode_icon(img: &DynamicImage, asset: &FaviconAsset) -> Result<Vec<u8>> {
    // The ICO encoder only takes 8-bit pixels.
    let resized = DynamicImage::ImageRgba8(
        img.resize_exact(asset.size, asset.size, FilterType::Lanczos3)
            .to_rgba8(),
    );

    let mut buf = Cursor::new(Vec::new());
    resized
        .write_to(&mut buf, asset.format)
        .with_context(|| format!("failed to encode {}", asset.name))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use image::{GenericImageView, Rgba, RgbaImage};

    use super::*;

    fn logo_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(64, 48, Rgba([200, 30, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn every_icon_is_rendered_at_its_size() {
        let icons = render_favicons(&logo_png()).unwrap();
        assert_eq!(icons.len(), FAVICON_ASSETS.len());

        for (asset, bytes) in icons {
            let decoded = image::load_from_memory_with_format(&bytes, asset.format).unwrap();
            assert_eq!(decoded.dimensions(), (asset.size, asset.size), "{}", asset.name);
        }
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(render_favicons(b"%PDF-1.7 not an image").is_err());
    }

    #[test]
    fn assets_are_found_by_name() {
        assert_eq!(favicon_asset("favicon.ico").unwrap().mime_type, "image/x-icon");
        assert_eq!(favicon_asset("apple-touch-icon.png").unwrap().size, 180);
        assert!(favicon_asset("robots.txt").is_none());
    }
}
