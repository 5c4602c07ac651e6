//! Rendering backends: charts, static images, detail tables and JSON.
//!
//! The expansion engine only talks to the traits defined here, so callers
//! can swap the raster chart renderer or the asset directory for their own
//! implementations.

mod asset;
mod chart;
mod json;
mod table;

pub use asset::{AssetSource, DirectoryAssets, NoAssets};
pub use chart::{
    ChartKind, ChartRenderer, ChartSpec, RasterChartRenderer, EM_INDIRECTES_SPLIT,
    FILE_EAU_BREAKDOWN, PALETTE, TRAVAUX_BREAKDOWN,
};
pub use json::{report_to_json, to_json, JsonFormat};
pub use table::{DetailTableBuilder, DETAIL_COLUMN_WIDTHS, DETAIL_HEADERS, EM_INDIRECTES_TABLE};

use std::path::Path;
use std::sync::Arc;

/// The media collaborators used during injection.
#[derive(Clone)]
pub struct Backends {
    /// Chart rasterizer
    pub charts: Arc<dyn ChartRenderer>,
    /// Static images
    pub assets: Arc<dyn AssetSource>,
    /// Detail tables
    pub tables: DetailTableBuilder,
}

impl Backends {
    /// Raster charts and images from `dir`.
    pub fn with_assets_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            assets: Arc::new(DirectoryAssets::new(dir)),
            ..Self::default()
        }
    }

    /// Replace the chart renderer.
    pub fn with_chart_renderer(mut self, renderer: impl ChartRenderer + 'static) -> Self {
        self.charts = Arc::new(renderer);
        self
    }

    /// Replace the asset source.
    pub fn with_asset_source(mut self, source: impl AssetSource + 'static) -> Self {
        self.assets = Arc::new(source);
        self
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            charts: Arc::new(RasterChartRenderer::default()),
            assets: Arc::new(NoAssets),
            tables: DetailTableBuilder::new(),
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}
