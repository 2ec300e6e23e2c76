//! Image similarity: the measure trait and a block SSIM reference

use crate::panel::PanelType;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Luminance raster, one value per pixel in `[0, dynamic_range]`
pub type Luma = DMatrix<f64>;

/// Pluggable image similarity. Scores are in [0, 1]; 1 means identical.
/// `None` when the two rasters cannot be compared or the score is not finite.
pub trait SimilarityMeasure {
    fn similarity(&self, baseline: &Luma, candidate: &Luma) -> Option<f64>;
}

/// Mean structural similarity over non-overlapping square blocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ssim {
    pub block: usize,
    pub dynamic_range: f64,
}

impl Default for Ssim {
    fn default() -> Self {
        Self { block: 8, dynamic_range: 1.0 }
    }
}

impl Ssim {
    fn block_score(&self, a: &Luma, b: &Luma, r: usize, c: usize, h: usize, w: usize) -> f64 {
        let c1 = (0.01 * self.dynamic_range).powi(2);
        let c2 = (0.03 * self.dynamic_range).powi(2);
        let wa = a.view((r, c), (h, w));
        let wb = b.view((r, c), (h, w));
        let n = (h * w) as f64;

        let mean_a = wa.sum() / n;
        let mean_b = wb.sum() / n;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        let mut cov = 0.0;
        for (x, y) in wa.iter().zip(wb.iter()) {
            let (dx, dy) = (x - mean_a, y - mean_b);
            var_a += dx * dx;
            var_b += dy * dy;
            cov += dx * dy;
        }
        var_a /= n;
        var_b /= n;
        cov /= n;

        ((2.0 * mean_a * mean_b + c1) * (2.0 * cov + c2))
            / ((mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2))
    }
}

impl SimilarityMeasure for Ssim {
    fn similarity(&self, baseline: &Luma, candidate: &Luma) -> Option<f64> {
        if baseline.shape() != candidate.shape() || baseline.is_empty() || self.block == 0 {
            return None;
        }
        let (rows, cols) = baseline.shape();
        // rasters smaller than a block are scored as one block
        let bh = self.block.min(rows);
        let bw = self.block.min(cols);

        let mut total = 0.0;
        let mut count = 0usize;
        for r in (0..=rows - bh).step_by(bh) {
            for c in (0..=cols - bw).step_by(bw) {
                total += self.block_score(baseline, candidate, r, c, bh, bw);
                count += 1;
            }
        }
        let score = total / count as f64;
        score.is_finite().then(|| score.clamp(0.0, 1.0))
    }
}

/// Image-level similarity of a candidate against its baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSimilarity {
    /// Whole-sheet score, when a composed sheet was compared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whole: Option<f64>,
    #[serde(default)]
    pub panels: BTreeMap<PanelType, f64>,
}

impl ImageSimilarity {
    pub fn with_whole(mut self, score: f64) -> Self {
        self.whole = Some(score);
        self
    }

    pub fn with_panel(mut self, panel: PanelType, score: f64) -> Self {
        self.panels.insert(panel, score);
        self
    }

    /// Score every (baseline, candidate) pair with `measure`.
    /// Pairs the measure cannot compare score 0.
    pub fn measure<M: SimilarityMeasure + ?Sized>(
        measure: &M,
        whole: Option<(&Luma, &Luma)>,
        panels: &BTreeMap<PanelType, (Luma, Luma)>,
    ) -> Self {
        Self {
            whole: whole.map(|(a, b)| measure.similarity(a, b).unwrap_or(0.0)),
            panels: panels
                .iter()
                .map(|(panel, (a, b))| (*panel, measure.similarity(a, b).unwrap_or(0.0)))
                .collect(),
        }
    }

    /// Lowest per-panel score
    pub fn worst_panel(&self) -> Option<(PanelType, f64)> {
        self.panels
            .iter()
            .map(|(p, s)| (*p, *s))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
