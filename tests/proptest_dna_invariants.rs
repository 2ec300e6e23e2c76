//! Property-based invariant tests for the deterministic pipeline.
//!
//! These tests verify invariants that must hold for any valid DNA:
//!
//! 1. Normalization is idempotent.
//! 2. Fingerprints ignore material order, whitespace noise and JSON key
//!    order, yet change whenever any single attribute is perturbed.
//! 3. Comparing a DNA with itself yields zero drift and no changes.
//! 4. Drift is always within [0, 1].
//! 5. Seeds are deterministic and stay within the provider range.
//! 6. Planned panels come out sorted, unique, one floor plan per storey.
//! 7. Layout slots stay inside the canvas and never overlap.
//! 8. Prompts are byte-identical for identical input.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use sheetdna_core::dna::{fingerprint, normalize, DesignDna, Material};
use sheetdna_core::drift::compare_dna;
use sheetdna_core::layout::{compute_layout, GRID, UK_RIBA_STANDARD};
use sheetdna_core::panel::{FloorLevel, PanelType, SheetType};
use sheetdna_core::planner::{plan_panels, SiteContext};
use sheetdna_core::prompt::{GenerationMode, PromptSet};
use sheetdna_core::seed::{derive_seed, SEED_MAX};

// ── Helpers ─────────────────────────────────────────────────────────────

fn material_strategy() -> impl Strategy<Value = Material> {
    ("[A-Z][a-z]{2,8}", proptest::option::of("#[0-9a-f]{6}")).prop_map(|(name, color)| match color {
        Some(c) => Material::with_color(name, c),
        None => Material::new(name),
    })
}

fn dna_strategy() -> impl Strategy<Value = DesignDna> {
    (
        1.0f64..200.0,
        1.0f64..200.0,
        2.5f64..80.0,
        1u32..=8,
        proptest::collection::vec(material_strategy(), 0..5),
        proptest::option::of("[A-Z][a-z]{3,10}"),
        proptest::option::of(0i64..1000),
    )
        .prop_map(|(length, width, height, floors, materials, style, budget)| {
            let mut dna = DesignDna::new(length, width, height, floors);
            dna.materials = materials;
            dna.style = style;
            if let Some(b) = budget {
                dna = dna.with_attribute("budget", serde_json::json!(b));
            }
            dna
        })
}

/// A DNA carrying a nested extended object and a few flat extended keys
fn rich_dna_strategy() -> impl Strategy<Value = DesignDna> {
    (
        dna_strategy(),
        proptest::collection::btree_map("[a-z]{1,6}", 0i64..100, 0..5),
        "[a-z]{3,8}",
        0u32..90,
    )
        .prop_map(|(mut dna, extra, form, pitch)| {
            for (key, value) in extra {
                dna = dna.with_attribute(format!("attr_{}", key), json!(value));
            }
            dna.with_attribute("roof", json!({ "form": form, "pitch": pitch, "eaves": [1, 2] }))
        })
}

/// Serialize `value` with every object's keys emitted in an order picked by `salt`
fn shuffled_json(value: &Value, salt: u64) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by_key(|(key, _)| {
                let mut hasher = DefaultHasher::new();
                (salt, key.as_str()).hash(&mut hasher);
                hasher.finish()
            });
            let body: Vec<String> = entries
                .into_iter()
                .map(|(key, child)| {
                    format!("{}:{}", Value::from(key.as_str()), shuffled_json(child, salt))
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Perturbation {
    Length(f64),
    Width(f64),
    Height(f64),
    ExtraFloor,
    ExtraMaterial,
    Style,
    ProjectType,
    Extended(i64),
}

fn perturbation_strategy() -> impl Strategy<Value = Perturbation> {
    prop_oneof![
        (0.01f64..5.0).prop_map(Perturbation::Length),
        (0.01f64..5.0).prop_map(Perturbation::Width),
        (0.01f64..5.0).prop_map(Perturbation::Height),
        Just(Perturbation::ExtraFloor),
        Just(Perturbation::ExtraMaterial),
        Just(Perturbation::Style),
        Just(Perturbation::ProjectType),
        any::<i64>().prop_map(Perturbation::Extended),
    ]
}

fn perturb(dna: &DesignDna, change: Perturbation) -> DesignDna {
    let mut out = dna.clone();
    match change {
        Perturbation::Length(d) => out.dimensions.length += d,
        Perturbation::Width(d) => out.dimensions.width += d,
        Perturbation::Height(d) => out.dimensions.height += d,
        Perturbation::ExtraFloor => out.dimensions.floor_count += 1,
        // generated names are 3-9 characters, so this one is always new
        Perturbation::ExtraMaterial => out.materials.push(Material::new("Qz")),
        Perturbation::Style => {
            out.style = Some(format!("{}Revised", dna.style.as_deref().unwrap_or_default()))
        }
        Perturbation::ProjectType => out.project_type = Some("perturbed-programme".to_string()),
        Perturbation::Extended(v) => out = out.with_attribute("perturbed", json!(v)),
    }
    out
}

fn sheet_strategy() -> impl Strategy<Value = SheetType> {
    prop_oneof![Just(SheetType::Arch), Just(SheetType::Concept), Just(SheetType::Technical)]
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Canonical form
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn normalize_idempotent(dna in dna_strategy()) {
        let once = normalize(&dna);
        let twice = normalize(&once.to_dna());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.fingerprint(), twice.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_material_order(dna in dna_strategy()) {
        let mut reversed = dna.clone();
        reversed.materials.reverse();
        prop_assert_eq!(fingerprint(&dna), fingerprint(&reversed));
    }

    #[test]
    fn fingerprint_ignores_json_key_order(dna in rich_dna_strategy(), salt in any::<u64>()) {
        let value = serde_json::to_value(&dna).unwrap();
        let shuffled = DesignDna::from_json_str(&shuffled_json(&value, salt)).unwrap();
        let plain = DesignDna::from_json_str(&value.to_string()).unwrap();
        prop_assert_eq!(fingerprint(&plain), fingerprint(&shuffled));
        prop_assert_eq!(fingerprint(&dna), fingerprint(&shuffled));
    }

    #[test]
    fn fingerprint_changes_under_single_perturbation(
        dna in rich_dna_strategy(),
        change in perturbation_strategy(),
    ) {
        let changed = perturb(&dna, change);
        prop_assert_ne!(fingerprint(&dna), fingerprint(&changed), "{:?}", change);
        prop_assert!(!compare_dna(&normalize(&dna), &normalize(&changed)).is_identical());
    }

    #[test]
    fn fingerprint_ignores_whitespace(
        words in proptest::collection::vec("[A-Za-z]{1,8}", 1..4),
        pad in 1usize..4,
    ) {
        let tidy = DesignDna::new(10.0, 8.0, 6.0, 2).with_style(words.join(" "));
        let gap = " ".repeat(pad);
        let noisy = DesignDna::new(10.0, 8.0, 6.0, 2)
            .with_style(format!("{gap}{}{gap}", words.join(&format!("{gap} "))));
        prop_assert_eq!(fingerprint(&tidy), fingerprint(&noisy));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-4. Drift
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn self_comparison_has_no_drift(dna in dna_strategy()) {
        let n = normalize(&dna);
        let cmp = compare_dna(&n, &n);
        prop_assert_eq!(cmp.drift, 0.0);
        prop_assert!(cmp.changes.is_empty());
    }

    #[test]
    fn drift_is_a_fraction(a in dna_strategy(), b in dna_strategy()) {
        let cmp = compare_dna(&normalize(&a), &normalize(&b));
        prop_assert!((0.0..=1.0).contains(&cmp.drift), "drift {}", cmp.drift);
        prop_assert!(cmp.changes.len() <= cmp.compared);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5-6. Seeds and planning
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn seeds_deterministic_and_in_range(dna in dna_strategy(), sheet in sheet_strategy()) {
        let a = plan_panels(&dna, &SiteContext::default(), sheet).unwrap();
        let b = plan_panels(&dna, &SiteContext::default(), sheet).unwrap();
        prop_assert_eq!(a.fingerprint, b.fingerprint);
        for (ja, jb) in a.jobs.iter().zip(&b.jobs) {
            prop_assert_eq!(ja.seed, jb.seed);
            prop_assert!((1..=SEED_MAX).contains(&ja.seed));
            prop_assert_eq!(ja.seed, derive_seed(&a.fingerprint, ja.panel));
        }
    }

    #[test]
    fn plan_sorted_unique_with_floor_plans(dna in dna_strategy()) {
        let plan = plan_panels(&dna, &SiteContext::default(), SheetType::Arch).unwrap();
        let panels = plan.panels();
        prop_assert!(panels.windows(2).all(|w| w[0] < w[1]));
        let floor_plans = panels.iter().filter(|p| matches!(p, PanelType::FloorPlan(_))).count();
        prop_assert_eq!(floor_plans as u32, dna.dimensions.floor_count);
        prop_assert!(panels.contains(&PanelType::FloorPlan(FloorLevel::Ground)));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Layout geometry
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn layout_slots_in_bounds_and_disjoint(
        width in 200u32..6000,
        height in 200u32..6000,
        sheet in sheet_strategy(),
        grid in any::<bool>(),
    ) {
        let key = if grid { GRID } else { UK_RIBA_STANDARD };
        if let Ok(layout) = compute_layout(width, height, sheet, key) {
            let bounds = layout.canvas.bounds();
            for (i, a) in layout.slots.iter().enumerate() {
                prop_assert!(!a.rect.is_empty());
                prop_assert!(bounds.contains_rect(&a.rect), "{:?} outside {:?}", a, bounds);
                prop_assert!(!a.rect.intersects(&layout.title_block));
                for b in &layout.slots[i + 1..] {
                    prop_assert!(!a.rect.intersects(&b.rect), "{:?} overlaps {:?}", a, b);
                }
            }
            prop_assert_eq!(compute_layout(width, height, sheet, key).ok(), Some(layout));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Prompt determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prompts_deterministic(dna in dna_strategy(), sheet in sheet_strategy()) {
        let plan = plan_panels(&dna, &SiteContext::default(), sheet).unwrap();
        let a = PromptSet::build(&plan, &GenerationMode::Generate);
        let b = PromptSet::build(&plan, &GenerationMode::Generate);
        prop_assert_eq!(&a, &b);
        for job in &plan.jobs {
            let prompt = a.get(job.panel).unwrap();
            prop_assert_eq!(prompt.metadata.seed, job.seed);
        }
    }
}
