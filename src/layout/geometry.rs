//! Integer pixel geometry for sheet layouts
//!
//! All layout math is integer so that recomputing a layout is bit-identical.

use serde::{Deserialize, Serialize};

/// A1 paper, landscape, in millimetres
pub const A1_WIDTH_MM: f64 = 841.0;
pub const A1_HEIGHT_MM: f64 = 594.0;

const MM_PER_INCH: f64 = 25.4;

/// Millimetres to whole pixels at `dpi`
pub fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm * f64::from(dpi) / MM_PER_INCH).round() as u32
}

/// Axis-aligned rectangle; right and bottom edges are exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the two rectangles share any interior area
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Pixel canvas a sheet is composed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// A1 landscape preview used by the presentation sheet
    pub const A1_LANDSCAPE_PREVIEW: Canvas = Canvas { width: 1792, height: 1269 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A1 sheet rendered at `dpi`
    pub fn a1(dpi: u32, landscape: bool) -> Self {
        let long = mm_to_px(A1_WIDTH_MM, dpi);
        let short = mm_to_px(A1_HEIGHT_MM, dpi);
        if landscape {
            Self::new(long, short)
        } else {
            Self::new(short, long)
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::A1_LANDSCAPE_PREVIEW
    }
}

/// Split `length` starting at `start` into spans proportional to `weights`,
/// separated by `gutter`. Spans tile `[start, start + length)` exactly.
/// `None` when there is no room for a non-empty span per weight.
pub(crate) fn partition(
    start: u32,
    length: u32,
    gutter: u32,
    weights: &[u32],
) -> Option<Vec<(u32, u32)>> {
    if weights.is_empty() {
        return Some(Vec::new());
    }
    let gaps = gutter.checked_mul(weights.len() as u32 - 1)?;
    let usable = u64::from(length.checked_sub(gaps)?);
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return None;
    }

    let mut spans = Vec::with_capacity(weights.len());
    let mut acc = 0u64;
    let mut prev_edge = 0u64;
    for (i, weight) in weights.iter().enumerate() {
        acc += u64::from(*weight);
        let edge = usable * acc / total;
        let size = edge - prev_edge;
        if size == 0 {
            return None;
        }
        let pos = u64::from(start) + prev_edge + u64::from(gutter) * i as u64;
        spans.push((pos as u32, size as u32));
        prev_edge = edge;
    }
    Some(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_is_exclusive_on_edges() {
        let a = Rect::new(0, 0, 10, 10);
        let touching = Rect::new(10, 0, 5, 10);
        let overlapping = Rect::new(9, 9, 5, 5);
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
        assert!(overlapping.intersects(&a));
    }

    #[test]
    fn test_partition_tiles_exactly() {
        let spans = partition(10, 1000, 8, &[3, 1, 1, 2]).unwrap();
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].0, 10);
        let (last_pos, last_size) = spans[3];
        assert_eq!(last_pos + last_size, 1010);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].0 + pair[0].1 + 8, pair[1].0);
        }
    }

    #[test]
    fn test_partition_rejects_cramped_space() {
        assert!(partition(0, 10, 8, &[1, 1, 1]).is_none());
        assert!(partition(0, 2, 0, &[1, 1, 1]).is_none());
        assert!(partition(0, 100, 0, &[0, 0]).is_none());
    }

    #[test]
    fn test_a1_canvas() {
        let c = Canvas::a1(150, true);
        assert_eq!(c, Canvas::new(4967, 3508));
        assert!(c.is_landscape());
        assert!(!Canvas::a1(150, false).is_landscape());
    }
}
