//! Annotation overlay renderer
//!
//! Draws the closed polylines of one annotation layer as translucent filled
//! polygons with an opaque outline over a base image and writes the result
//! as a JPEG.
//!
//! # Feature Requirements
//!
//! This module requires the `render` feature flag (enabled by default).

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::models::{AnnotationDocument, AnnotationElement, AnnotationSource};

/// Errors rendering an overlay
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed annotation file {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Annotation layer {index} not found ({available} available)")]
    LayerOutOfRange { index: usize, available: usize },

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Image too large for JPEG: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a render produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub shapes_drawn: usize,
    pub shapes_skipped: usize,
}

/// Renders annotation layers onto images
#[derive(Debug, Clone, Default)]
pub struct AnnotationRenderer {
    config: RenderConfig,
}

impl AnnotationRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Composite the closed polylines of `document` over `base`.
    ///
    /// Elements other than closed polylines are ignored, as are polygons
    /// with fewer than three distinct vertices.
    pub fn composite(&self, base: &DynamicImage, document: &AnnotationDocument) -> RgbImage {
        let (composited, _, _) = self.composite_counted(base, document);
        composited
    }

    fn composite_counted(
        &self,
        base: &DynamicImage,
        document: &AnnotationDocument,
    ) -> (RgbImage, usize, usize) {
        let mut background = base.to_rgba8();
        let mut layer = RgbaImage::new(background.width(), background.height());
        let fill = Rgba(self.config.fill_color);
        let outline = Rgba(self.config.outline_color);

        let mut drawn = 0;
        let mut skipped = 0;
        let (width, height) = background.dimensions();
        for element in document.closed_polylines() {
            let Some(polygon) = polygon_vertices(element, width, height) else {
                skipped += 1;
                continue;
            };

            draw_polygon_mut(&mut layer, &polygon, fill);
            for (i, start) in polygon.iter().enumerate() {
                let end = polygon[(i + 1) % polygon.len()];
                draw_line_segment_mut(
                    &mut layer,
                    (start.x as f32, start.y as f32),
                    (end.x as f32, end.y as f32),
                    outline,
                );
            }
            drawn += 1;
        }
        debug!("Drew {} polygons, skipped {}", drawn, skipped);

        for (dst, src) in background.pixels_mut().zip(layer.pixels()) {
            *dst = blend_over(*src, *dst);
        }

        (DynamicImage::ImageRgba8(background).to_rgb8(), drawn, skipped)
    }

    /// Render layer `config.layer_index` of `source_path` over the image at
    /// `base_path` and write a JPEG to `output_path`.
    ///
    /// The output file is only written once encoding succeeded.
    pub fn render_to_file(
        &self,
        base_path: impl AsRef<Path>,
        source_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<RenderSummary, RenderError> {
        let base_path = base_path.as_ref();
        let source_path = source_path.as_ref();
        let output_path = output_path.as_ref();

        let quality = self.config.quality;
        if !(1..=100).contains(&quality) {
            return Err(RenderError::InvalidQuality(quality));
        }

        let base = image::open(base_path).map_err(|source| RenderError::Image {
            path: base_path.to_path_buf(),
            source,
        })?;

        let content = fs::read_to_string(source_path).map_err(|source| RenderError::Read {
            path: source_path.to_path_buf(),
            source,
        })?;
        let annotations: AnnotationSource =
            serde_json::from_str(&content).map_err(|source| RenderError::Source {
                path: source_path.to_path_buf(),
                source,
            })?;

        let index = self.config.layer_index;
        let document = annotations
            .layer(index)
            .ok_or(RenderError::LayerOutOfRange {
                index,
                available: annotations.layer_count(),
            })?;

        let (composited, shapes_drawn, shapes_skipped) = self.composite_counted(&base, document);
        let jpeg = encode_jpeg(&composited, quality)?;
        fs::write(output_path, jpeg).map_err(|source| RenderError::Write {
            path: output_path.to_path_buf(),
            source,
        })?;

        Ok(RenderSummary {
            output_path: output_path.to_path_buf(),
            width: composited.width(),
            height: composited.height(),
            shapes_drawn,
            shapes_skipped,
        })
    }
}

/// Render with default colours and the first layer.
///
/// Returns `false` (after logging a warning) on any failure.
pub fn render_annotations(
    base_path: impl AsRef<Path>,
    source_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    quality: u8,
) -> bool {
    let renderer = AnnotationRenderer::new(RenderConfig::default().with_quality(quality));
    match renderer.render_to_file(base_path, source_path, output_path) {
        Ok(_) => true,
        Err(e) => {
            warn!("Error rendering annotations: {}", e);
            false
        }
    }
}

/// Distance outside the image that clipped polygons may extend to. Keeps
/// clipped edges off the visible border.
const CLIP_MARGIN: f64 = 2.0;

/// One side of the clip rectangle
#[derive(Debug, Clone, Copy)]
enum ClipEdge {
    Left(f64),
    Right(f64),
    Top(f64),
    Bottom(f64),
}

impl ClipEdge {
    fn inside(self, (x, y): (f64, f64)) -> bool {
        match self {
            ClipEdge::Left(v) => x >= v,
            ClipEdge::Right(v) => x <= v,
            ClipEdge::Top(v) => y >= v,
            ClipEdge::Bottom(v) => y <= v,
        }
    }

    /// Where segment `a`-`b` crosses this edge. Only called when exactly one
    /// end is inside, so the divisor is never zero.
    fn intersect(self, a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
        match self {
            ClipEdge::Left(v) | ClipEdge::Right(v) => {
                let t = (v - a.0) / (b.0 - a.0);
                (v, a.1 + t * (b.1 - a.1))
            }
            ClipEdge::Top(v) | ClipEdge::Bottom(v) => {
                let t = (v - a.1) / (b.1 - a.1);
                (a.0 + t * (b.0 - a.0), v)
            }
        }
    }
}

/// Sutherland-Hodgman clip of a polygon against the image rectangle grown by
/// [`CLIP_MARGIN`]
fn clip_polygon(points: Vec<(f64, f64)>, width: u32, height: u32) -> Vec<(f64, f64)> {
    let edges = [
        ClipEdge::Left(-CLIP_MARGIN),
        ClipEdge::Right(f64::from(width) + CLIP_MARGIN),
        ClipEdge::Top(-CLIP_MARGIN),
        ClipEdge::Bottom(f64::from(height) + CLIP_MARGIN),
    ];

    edges.into_iter().fold(points, |input, edge| {
        let mut output = Vec::with_capacity(input.len() + 4);
        for (i, &current) in input.iter().enumerate() {
            let previous = input[(i + input.len() - 1) % input.len()];
            match (edge.inside(previous), edge.inside(current)) {
                (true, true) => output.push(current),
                (true, false) => output.push(edge.intersect(previous, current)),
                (false, true) => {
                    output.push(edge.intersect(previous, current));
                    output.push(current);
                }
                (false, false) => {}
            }
        }
        output
    })
}

/// Integer vertices of a closed polyline clipped to a `width` x `height`
/// image, or `None` when fewer than three distinct vertices remain (this
/// includes shapes lying entirely outside the image).
fn polygon_vertices(
    element: &AnnotationElement,
    width: u32,
    height: u32,
) -> Option<Vec<Point<i32>>> {
    let points: Vec<(f64, f64)> = element
        .planar_points()
        .into_iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let mut polygon: Vec<Point<i32>> = Vec::new();
    for (x, y) in clip_polygon(points, width, height) {
        // Bounded by the clip rectangle, so the casts cannot saturate
        let point = Point::new(x.round() as i32, y.round() as i32);
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    // Closing vertex is implied
    if polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    (polygon.len() >= 3).then_some(polygon)
}

/// Porter-Duff "over": `src` composited onto `dst`
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let src_a = f32::from(src[3]) / 255.0;
    if src_a == 0.0 {
        return dst;
    }
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (f32::from(src[c]) * src_a + f32::from(dst[c]) * dst_a * (1.0 - src_a)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    Rgba(out)
}

/// Progressive JPEG with 4:2:0 chroma subsampling
fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, RenderError> {
    let (width, height) = image.dimensions();
    let too_large = || RenderError::TooLarge { width, height };
    let w = u16::try_from(width).map_err(|_| too_large())?;
    let h = u16::try_from(height).map_err(|_| too_large())?;

    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, quality);
    encoder.set_sampling_factor(SamplingFactor::R_4_2_0);
    encoder.set_progressive(true);
    encoder
        .encode(image.as_raw(), w, h, ColorType::Rgb)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(size, size, Rgb([255, 255, 255])))
    }

    #[test]
    fn test_polygon_vertices_dedup_and_close() {
        let element = AnnotationElement::polyline(
            &[(0.0, 0.0), (0.2, 0.1), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)],
            true,
        );
        let polygon = polygon_vertices(&element, 20, 20).unwrap();
        assert_eq!(
            polygon,
            vec![Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)]
        );
    }

    #[test]
    fn test_degenerate_polygons_are_skipped() {
        let line = AnnotationElement::polyline(&[(0.0, 0.0), (5.0, 5.0), (0.0, 0.0)], true);
        assert!(polygon_vertices(&line, 20, 20).is_none());
        let empty = AnnotationElement::polyline(&[], true);
        assert!(polygon_vertices(&empty, 20, 20).is_none());

        let doc = AnnotationDocument::new("a").with_element(line);
        let renderer = AnnotationRenderer::default();
        let (image, drawn, skipped) = renderer.composite_counted(&white(8), &doc);
        assert_eq!((drawn, skipped), (0, 1));
        assert_eq!(image, white(8).to_rgb8());
    }

    #[test]
    fn test_clip_keeps_inner_polygon() {
        let square = vec![(1.0, 1.0), (5.0, 1.0), (5.0, 5.0), (1.0, 5.0)];
        assert_eq!(clip_polygon(square.clone(), 10, 10), square);
    }

    #[test]
    fn test_clip_bounds_huge_coordinates() {
        let element = AnnotationElement::polyline(
            &[(0.0, 1e12), (5.0, -1e12), (10.0, 5.0)],
            true,
        );
        let polygon = polygon_vertices(&element, 20, 20).unwrap();
        for point in &polygon {
            assert!((-2..=22).contains(&point.x), "{:?}", point);
            assert!((-2..=22).contains(&point.y), "{:?}", point);
        }
    }

    #[test]
    fn test_polygon_outside_image_is_skipped() {
        let far = AnnotationElement::polyline(
            &[(100.0, 100.0), (110.0, 100.0), (110.0, 110.0)],
            true,
        );
        assert!(polygon_vertices(&far, 20, 20).is_none());
    }

    #[test]
    fn test_blend_over() {
        let dst = Rgba([255, 255, 255, 255]);
        assert_eq!(blend_over(Rgba([0, 0, 0, 0]), dst), dst);
        assert_eq!(blend_over(Rgba([0, 212, 186, 255]), dst), Rgba([0, 212, 186, 255]));

        let fill = blend_over(Rgba([74, 204, 181, 74]), dst);
        assert_eq!(fill[3], 255);
        assert!(fill[0] < 255 && fill[0] > 74);
    }

    #[test]
    fn test_open_polylines_ignored() {
        let doc = AnnotationDocument::new("a").with_element(AnnotationElement::polyline(
            &[(0.0, 0.0), (7.0, 0.0), (7.0, 7.0), (0.0, 7.0)],
            false,
        ));
        let image = AnnotationRenderer::default().composite(&white(8), &doc);
        assert_eq!(image, white(8).to_rgb8());
    }

    #[test]
    fn test_encode_jpeg_rejects_oversized() {
        let image = RgbImage::new(70_000, 1);
        assert!(matches!(
            encode_jpeg(&image, 90),
            Err(RenderError::TooLarge { .. })
        ));
    }
}
