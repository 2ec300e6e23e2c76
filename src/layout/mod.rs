//! Layout Composer — deterministic panel placement on a fixed canvas
//!
//! For a given (canvas, sheet type, layout key) the composer always returns
//! the same slots, in reading order, with bit-identical rectangles. Layouts
//! are derived data; DNA and configuration stay the source of truth.

mod geometry;
mod template;

pub use geometry::{mm_to_px, Canvas, Rect, A1_HEIGHT_MM, A1_WIDTH_MM};
pub use template::{
    template_for, RowSpec, Template, GRID, TEMPLATE_FLOOR_CAPACITY, UK_RIBA_STANDARD,
};

use crate::panel::{PanelType, SheetType};
use crate::planner::PanelCatalog;
use geometry::partition;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Margin around the sheet, percent of the short side
const MARGIN_PCT: u32 = 2;
/// Gutter between slots, percent of the short side
const GUTTER_PCT: u32 = 1;
/// Title block strip at the bottom, percent of the height
const TITLE_BLOCK_PCT: u32 = 6;
/// Smallest slot edge worth rendering
const MIN_SLOT_PX: u32 = 16;

/// A panel's rectangle on the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSlot {
    pub panel: PanelType,
    pub rect: Rect,
}

/// Computed sheet layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLayout {
    pub layout_key: String,
    pub sheet_type: SheetType,
    pub canvas: Canvas,
    pub title_block: Rect,
    #[serde(rename = "panelCoordinates")]
    pub slots: Vec<LayoutSlot>,
}

impl SheetLayout {
    pub fn slot(&self, panel: PanelType) -> Option<&LayoutSlot> {
        self.slots.iter().find(|s| s.panel == panel)
    }

    pub fn panels(&self) -> Vec<PanelType> {
        self.slots.iter().map(|s| s.panel).collect()
    }

    /// Every slot inside the canvas, no two slots overlapping, no duplicates
    pub fn check_geometry(&self) -> Result<(), LayoutError> {
        let bounds = self.canvas.bounds();
        let mut seen = BTreeSet::new();
        for (i, slot) in self.slots.iter().enumerate() {
            if !seen.insert(slot.panel) {
                return Err(LayoutError::DuplicateSlot(slot.panel));
            }
            if slot.rect.is_empty() || !bounds.contains_rect(&slot.rect) {
                return Err(LayoutError::OutOfBounds(slot.panel));
            }
            if slot.rect.intersects(&self.title_block) {
                return Err(LayoutError::Overlap(slot.panel, None));
            }
            for other in &self.slots[i + 1..] {
                if slot.rect.intersects(&other.rect) {
                    return Err(LayoutError::Overlap(slot.panel, Some(other.panel)));
                }
            }
        }
        Ok(())
    }
}

/// Compute the layout against the default panel catalog
pub fn compute_layout(
    canvas_width: u32,
    canvas_height: u32,
    sheet: SheetType,
    layout_key: &str,
) -> Result<SheetLayout, LayoutError> {
    compute_layout_with(&PanelCatalog::default(), canvas_width, canvas_height, sheet, layout_key)
}

/// `pct` percent of `value`, rounded down; never overflows
fn percent_of(value: u32, pct: u32) -> u32 {
    (u64::from(value) * u64::from(pct.min(100)) / 100) as u32
}

/// Compute the layout; `catalog` only matters for catalog-driven templates
pub fn compute_layout_with(
    catalog: &PanelCatalog,
    canvas_width: u32,
    canvas_height: u32,
    sheet: SheetType,
    layout_key: &str,
) -> Result<SheetLayout, LayoutError> {
    let canvas = Canvas::new(canvas_width, canvas_height);
    let too_small = || LayoutError::CanvasTooSmall { width: canvas_width, height: canvas_height };

    let template = template_for(sheet, layout_key, catalog).ok_or_else(|| {
        LayoutError::UnknownLayoutKey { key: layout_key.to_string(), sheet }
    })?;

    let short = canvas_width.min(canvas_height);
    let margin = percent_of(short, MARGIN_PCT);
    let gutter = percent_of(short, GUTTER_PCT);
    let title_height = percent_of(canvas_height, TITLE_BLOCK_PCT);

    let content_width = canvas_width.checked_sub(2 * margin).ok_or_else(too_small)?;
    let content_height = canvas_height
        .checked_sub(2 * margin + title_height + gutter)
        .ok_or_else(too_small)?;
    if content_width == 0 || content_height == 0 {
        return Err(too_small());
    }
    let title_block = Rect::new(
        margin,
        canvas_height - margin - title_height,
        content_width,
        title_height,
    );

    let mut slots = Vec::new();
    match &template {
        Template::Rows(rows) => {
            let row_weights: Vec<u32> = rows.iter().map(|r| r.weight).collect();
            let row_spans =
                partition(margin, content_height, gutter, &row_weights).ok_or_else(too_small)?;
            for (row, (y, height)) in rows.iter().zip(row_spans) {
                let cell_weights: Vec<u32> = row.cells.iter().map(|c| c.1).collect();
                let col_spans =
                    partition(margin, content_width, gutter, &cell_weights).ok_or_else(too_small)?;
                for ((panel, _), (x, width)) in row.cells.iter().zip(col_spans) {
                    slots.push(LayoutSlot { panel: *panel, rect: Rect::new(x, y, width, height) });
                }
            }
        }
        Template::Grid(panels) => {
            let n = panels.len() as u32;
            let mut cols = 1;
            while cols * cols < n {
                cols += 1;
            }
            let rows = n.div_ceil(cols);
            let (cols, rows) = if canvas.is_landscape() { (cols, rows) } else { (rows, cols) };
            let row_spans =
                partition(margin, content_height, gutter, &vec![1; rows as usize])
                    .ok_or_else(too_small)?;
            let col_spans =
                partition(margin, content_width, gutter, &vec![1; cols as usize])
                    .ok_or_else(too_small)?;
            for (i, panel) in panels.iter().enumerate() {
                let (r, c) = (i / cols as usize, i % cols as usize);
                let (y, height) = row_spans[r];
                let (x, width) = col_spans[c];
                slots.push(LayoutSlot { panel: *panel, rect: Rect::new(x, y, width, height) });
            }
        }
    }

    if slots.iter().any(|s| s.rect.width < MIN_SLOT_PX || s.rect.height < MIN_SLOT_PX) {
        return Err(too_small());
    }
    slots.sort_by_key(|s| s.panel);
    let layout = SheetLayout {
        layout_key: layout_key.to_string(),
        sheet_type: sheet,
        canvas,
        title_block,
        slots,
    };
    layout.check_geometry()?;
    debug!(
        "Layout '{}' for {} on {}x{}: {} slots",
        layout_key,
        sheet,
        canvas_width,
        canvas_height,
        layout.slots.len()
    );
    Ok(layout)
}

/// What to do when a planned panel has no slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSlotPolicy {
    /// Report a warning, layout stays valid (partial sheet)
    #[default]
    Warn,
    /// Missing slots invalidate the layout
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutValidation {
    pub valid: bool,
    pub missing: Vec<PanelType>,
    pub warnings: Vec<String>,
}

/// Check that every planned panel has a slot in `layout`
pub fn validate_layout(
    layout: &SheetLayout,
    panels: &[PanelType],
    policy: MissingSlotPolicy,
) -> LayoutValidation {
    let missing: Vec<PanelType> = panels
        .iter()
        .copied()
        .filter(|p| layout.slot(*p).is_none())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let warnings: Vec<String> = missing
        .iter()
        .map(|p| format!("no layout slot for panel '{}' in layout '{}'", p, layout.layout_key))
        .collect();
    for w in &warnings {
        warn!("{}", w);
    }

    LayoutValidation {
        valid: missing.is_empty() || policy == MissingSlotPolicy::Warn,
        missing,
        warnings,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("unknown layout key '{key}' for sheet type {sheet}")]
    UnknownLayoutKey { key: String, sheet: SheetType },

    #[error("canvas {width}x{height} is too small for the layout")]
    CanvasTooSmall { width: u32, height: u32 },

    #[error("slot for {0} falls outside the canvas")]
    OutOfBounds(PanelType),

    #[error("slot for {} overlaps {}", .0, overlap_target(.1))]
    Overlap(PanelType, Option<PanelType>),

    #[error("panel {0} has more than one slot")]
    DuplicateSlot(PanelType),
}

fn overlap_target(other: &Option<PanelType>) -> String {
    other.map(|p| p.id()).unwrap_or_else(|| "the title block".to_string())
}
