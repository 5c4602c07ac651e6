//! Chart rasterization.
//!
//! Charts are drawn with `imageproc` onto an RGBA buffer and encoded as PNG.
//! Text (title, percentages, legend, bar labels) uses the bundled DejaVu Sans
//! font through `ab_glyph`.

use crate::data::kpi::format_decimal;
use crate::data::DetailRow;
use crate::error::{Error, Result};
use crate::model::Resource;
use ab_glyph::{FontRef, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut, draw_text_mut, text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::f64::consts::PI;
use std::io::Cursor;

/// Works breakdown, one bar per sub-category.
pub const TRAVAUX_BREAKDOWN: &str = "TRAVAUX_BREAKDOWN";
/// Treatment line breakdown.
pub const FILE_EAU_BREAKDOWN: &str = "FILE_EAU_BREAKDOWN";
/// Indirect emissions split.
pub const EM_INDIRECTES_SPLIT: &str = "EM_INDIRECTES_SPLIT";

/// Shape of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Share of each value in the total
    Pie,
    /// One vertical bar per value
    Bar,
}

/// What to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    /// `(label, value)` pairs in drawing order
    pub series: Vec<(String, f64)>,
}

impl ChartSpec {
    pub fn pie(title: impl Into<String>, series: Vec<(String, f64)>) -> Self {
        Self {
            kind: ChartKind::Pie,
            title: title.into(),
            series,
        }
    }

    pub fn bar(title: impl Into<String>, series: Vec<(String, f64)>) -> Self {
        Self {
            kind: ChartKind::Bar,
            title: title.into(),
            series,
        }
    }

    /// Chart bound to a content catalog key, fed with level-2 detail rows.
    ///
    /// `None` for keys without a known layout.
    pub fn from_catalog_key(key: &str, rows: &[DetailRow]) -> Option<Self> {
        let series = rows.iter().map(|r| (r.label.clone(), r.tco2e)).collect();
        match key {
            TRAVAUX_BREAKDOWN => Some(Self::bar("Répartition des travaux", series)),
            FILE_EAU_BREAKDOWN => Some(Self::pie("Répartition par file eau", series)),
            EM_INDIRECTES_SPLIT => Some(Self::pie("Émissions indirectes", series)),
            _ => None,
        }
    }

    /// Whether there is nothing positive to draw.
    pub fn is_empty(&self) -> bool {
        !self.series.iter().any(|(_, v)| v.is_finite() && *v > 0.0)
    }
}

/// Turns a [`ChartSpec`] into an embeddable image.
///
/// `Ok(None)` means "nothing to show"; errors are reserved for encoder
/// failures and are swallowed by the caller.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, spec: &ChartSpec) -> Result<Option<Resource>>;
}

/// Green report palette.
pub const PALETTE: [[u8; 3]; 6] = [
    [0x0B, 0x3B, 0x2E],
    [0x3F, 0x9B, 0x83],
    [0x62, 0xCC, 0x7B],
    [0x8A, 0xD2, 0xC5],
    [0xCD, 0xEF, 0xE8],
    [0xE9, 0xF7, 0xF4],
];

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([0x55, 0x55, 0x55, 255]);
const TEXT: Rgba<u8> = Rgba([0x22, 0x22, 0x22, 255]);
const TEXT_ON_DARK: Rgba<u8> = Rgba([255, 255, 255, 255]);

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Slices below this share get no percentage label.
const MIN_LABELED_SHARE: f64 = 0.04;

/// Arc resolution of pie slices, in radians.
const ARC_STEP: f64 = PI / 90.0;

fn load_font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(FONT_DATA)
        .map_err(|e| Error::Render(format!("cannot load chart font: {}", e)))
}

/// Pixel layout shared by both chart kinds.
#[derive(Debug, Clone, Copy)]
struct Frame {
    title_px: f32,
    label_px: f32,
    margin: u32,
    /// First row below the title band
    top: u32,
}

impl Frame {
    /// Height of one line of label text, with spacing.
    fn line_h(&self) -> u32 {
        (self.label_px * 1.5).ceil() as u32
    }
}

/// Where the pie and its legend go.
#[derive(Debug, Clone, Copy)]
struct PieFrame {
    cx: f64,
    cy: f64,
    radius: f64,
    legend_x: u32,
}

/// Where the bars go.
#[derive(Debug, Clone, Copy)]
struct BarFrame {
    left: u32,
    /// Highest reachable bar top
    plot_top: u32,
    baseline: u32,
    slot: u32,
    bar_w: u32,
}

impl BarFrame {
    fn plot_h(&self) -> u32 {
        self.baseline.saturating_sub(self.plot_top)
    }

    fn bar_x(&self, index: usize) -> u32 {
        self.left + index as u32 * self.slot + (self.slot - self.bar_w) / 2
    }
}

/// PNG chart renderer built on `imageproc`.
#[derive(Debug, Clone)]
pub struct RasterChartRenderer {
    width: u32,
    height: u32,
}

impl RasterChartRenderer {
    /// Renderer producing `width` × `height` pixel images.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(16),
            height: height.max(16),
        }
    }

    fn color(index: usize) -> Rgba<u8> {
        let [r, g, b] = PALETTE[index % PALETTE.len()];
        Rgba([r, g, b, 255])
    }

    /// Readable text color on top of `fill`.
    fn text_on(fill: Rgba<u8>) -> Rgba<u8> {
        let [r, g, b, _] = fill.0;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        if luma > 140.0 {
            TEXT
        } else {
            TEXT_ON_DARK
        }
    }

    fn frame(&self) -> Frame {
        let title_px = (self.height as f32 / 18.0).max(8.0);
        let label_px = (self.height as f32 / 30.0).max(6.0);
        let margin = (self.width.min(self.height) / 20).max(2);
        let top = margin + (title_px * 1.5).ceil() as u32;
        Frame {
            title_px,
            label_px,
            margin,
            top,
        }
    }

    fn pie_frame(&self, frame: &Frame) -> PieFrame {
        let pie_w = self.width * 3 / 5;
        let avail_h = self.height.saturating_sub(frame.top + frame.margin);
        PieFrame {
            cx: pie_w as f64 / 2.0,
            cy: frame.top as f64 + avail_h as f64 / 2.0,
            radius: (pie_w.min(avail_h) as f64 / 2.0 * 0.9).max(2.0),
            legend_x: pie_w + frame.margin,
        }
    }

    fn bar_frame(&self, frame: &Frame, count: usize) -> BarFrame {
        let line_h = frame.line_h();
        let baseline = self
            .height
            .saturating_sub(frame.margin + line_h)
            .max(frame.top);
        let plot_w = self.width.saturating_sub(2 * frame.margin).max(1);
        // More entries than pixels: one-pixel slots, the overflow is clipped.
        let slot = (plot_w / count.max(1) as u32).max(1);
        BarFrame {
            left: frame.margin,
            plot_top: (frame.top + line_h).min(baseline),
            baseline,
            slot,
            bar_w: (slot * 7 / 10).clamp(1, slot),
        }
    }

    fn draw_title(&self, img: &mut RgbaImage, font: &FontRef, frame: &Frame, title: &str) {
        let scale = PxScale::from(frame.title_px);
        let Some(text) = fit_text(font, scale, title, self.width.saturating_sub(2 * frame.margin)) else {
            return;
        };
        let (w, _) = text_size(scale, font, &text);
        let x = (self.width.saturating_sub(w) / 2) as i32;
        draw_text_mut(img, TEXT, x, frame.margin as i32, scale, font, &text);
    }

    fn draw_pie(&self, img: &mut RgbaImage, font: &FontRef, frame: &Frame, series: &[(&str, f64)]) {
        let total: f64 = series.iter().map(|(_, v)| v).sum();
        let pie = self.pie_frame(frame);
        let point = |angle: f64, r: f64| {
            // Clockwise from 12 o'clock.
            Point::new(
                (pie.cx + r * angle.sin()).round() as i32,
                (pie.cy - r * angle.cos()).round() as i32,
            )
        };

        let mut start = 0.0;
        for (i, (_, v)) in series.iter().enumerate() {
            let share = v / total;
            let end = start + share * 2.0 * PI;
            if share >= 1.0 - f64::EPSILON {
                let center = (pie.cx.round() as i32, pie.cy.round() as i32);
                draw_filled_circle_mut(img, center, pie.radius.round() as i32, Self::color(i));
            } else if share > 0.0 {
                let steps = ((end - start) / ARC_STEP).ceil().max(1.0) as usize;
                let mut poly = vec![point(0.0, 0.0)];
                for s in 0..=steps {
                    let p = point(start + (end - start) * s as f64 / steps as f64, pie.radius);
                    if poly.last() != Some(&p) {
                        poly.push(p);
                    }
                }
                if poly.len() >= 3 && poly.first() != poly.last() {
                    draw_polygon_mut(img, &poly, Self::color(i));
                }
            }
            start = end;
        }

        // Percentages, on top of every slice.
        let scale = PxScale::from(frame.label_px);
        let mut start = 0.0;
        for (i, (_, v)) in series.iter().enumerate() {
            let share = v / total;
            let mid = start + share * PI;
            start += share * 2.0 * PI;
            if share < MIN_LABELED_SHARE {
                continue;
            }
            let text = format!("{} %", format_decimal(share * 100.0, 1));
            let (w, h) = text_size(scale, font, &text);
            let at = point(mid, pie.radius * 0.65);
            draw_text_mut(
                img,
                Self::text_on(Self::color(i)),
                at.x - w as i32 / 2,
                at.y - h as i32 / 2,
                scale,
                font,
                &text,
            );
        }

        self.draw_legend(img, font, frame, pie.legend_x, series, total);
    }

    fn draw_legend(
        &self,
        img: &mut RgbaImage,
        font: &FontRef,
        frame: &Frame,
        x: u32,
        series: &[(&str, f64)],
        total: f64,
    ) {
        let scale = PxScale::from(frame.label_px);
        let swatch = frame.label_px.ceil() as u32;
        let text_x = x + swatch + swatch / 2;
        let max_w = self.width.saturating_sub(text_x + frame.margin);
        for (i, (label, v)) in series.iter().enumerate() {
            let y = frame.top + i as u32 * frame.line_h();
            if y + swatch > self.height {
                log::debug!("legend truncated after {} entries", i);
                break;
            }
            draw_filled_rect_mut(
                img,
                Rect::at(x as i32, y as i32).of_size(swatch, swatch),
                Self::color(i),
            );
            let entry = format!("{} ({} %)", label, format_decimal(v / total * 100.0, 1));
            if let Some(text) = fit_text(font, scale, &entry, max_w) {
                draw_text_mut(img, TEXT, text_x as i32, y as i32, scale, font, &text);
            }
        }
    }

    fn draw_bars(&self, img: &mut RgbaImage, font: &FontRef, frame: &Frame, series: &[(&str, f64)]) {
        let max = series.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
        let bars = self.bar_frame(frame, series.len());
        let right = self.width.saturating_sub(frame.margin);
        let scale = PxScale::from(frame.label_px);

        for (i, (label, v)) in series.iter().enumerate() {
            let x0 = bars.bar_x(i);
            if x0 >= right {
                log::debug!("{} bar(s) do not fit the chart width", series.len() - i);
                break;
            }
            let w = bars.bar_w.min(right - x0);
            let h = ((v / max) * bars.plot_h() as f64).round() as u32;
            let top = bars.baseline - h;
            if h > 0 {
                draw_filled_rect_mut(
                    img,
                    Rect::at(x0 as i32, top as i32).of_size(w, h),
                    Self::color(i),
                );
            }

            let center = (bars.left + i as u32 * bars.slot + bars.slot / 2) as i32;
            if let Some(text) = fit_text(font, scale, &format_decimal(*v, 1), bars.slot) {
                let (tw, th) = text_size(scale, font, &text);
                let y = top as i32 - th as i32 - 2;
                draw_text_mut(img, TEXT, center - tw as i32 / 2, y, scale, font, &text);
            }
            if let Some(text) = fit_text(font, scale, label, bars.slot) {
                let (tw, _) = text_size(scale, font, &text);
                let y = (bars.baseline + 3) as i32;
                draw_text_mut(img, TEXT, center - tw as i32 / 2, y, scale, font, &text);
            }
        }

        let plot_w = right.saturating_sub(bars.left).max(1);
        draw_filled_rect_mut(
            img,
            Rect::at(bars.left as i32, bars.baseline as i32).of_size(plot_w, 1),
            AXIS,
        );
        draw_filled_rect_mut(
            img,
            Rect::at(bars.left as i32, bars.plot_top as i32)
                .of_size(1, bars.plot_h() + 1),
            AXIS,
        );
    }
}

/// `text`, shortened with an ellipsis until it fits `max_w` pixels.
fn fit_text(font: &FontRef, scale: PxScale, text: &str, max_w: u32) -> Option<String> {
    if text.is_empty() || max_w == 0 {
        return None;
    }
    if text_size(scale, font, text).0 <= max_w {
        return Some(text.to_string());
    }
    let chars: Vec<char> = text.chars().collect();
    (1..chars.len()).rev().find_map(|n| {
        let short: String = chars[..n].iter().chain(std::iter::once(&'…')).collect();
        (text_size(scale, font, &short).0 <= max_w).then_some(short)
    })
}

impl Default for RasterChartRenderer {
    /// 8 × 6 inches at 150 DPI.
    fn default() -> Self {
        Self::new(1200, 900)
    }
}

impl ChartRenderer for RasterChartRenderer {
    fn render(&self, spec: &ChartSpec) -> Result<Option<Resource>> {
        if spec.is_empty() {
            log::debug!("chart '{}' has no positive value, skipped", spec.title);
            return Ok(None);
        }

        let series: Vec<(&str, f64)> = spec
            .series
            .iter()
            .map(|(label, v)| (label.as_str(), if v.is_finite() { v.max(0.0) } else { 0.0 }))
            .collect();

        let font = load_font()?;
        let frame = self.frame();
        let mut img = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        self.draw_title(&mut img, &font, &frame, &spec.title);
        match spec.kind {
            ChartKind::Pie => self.draw_pie(&mut img, &font, &frame, &series),
            ChartKind::Bar => self.draw_bars(&mut img, &font, &frame, &series),
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(Some(
            Resource::png(bytes).with_dimensions(self.width, self.height),
        ))
    }
}
