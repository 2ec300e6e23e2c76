use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;
use serde_json::json;
use sheetdna_core::dna::{fingerprint, normalize, DesignDna, Material};
use sheetdna_core::drift::{compare_dna, SimilarityMeasure, Ssim};
use sheetdna_core::layout::{compute_layout, UK_RIBA_STANDARD};
use sheetdna_core::planner::{plan_panels, SiteContext};
use sheetdna_core::prompt::{GenerationMode, PromptSet};
use sheetdna_core::SheetType;

fn sample_dna() -> DesignDna {
    DesignDna::new(15.0, 12.0, 7.0, 3)
        .with_material(Material::with_color("Brick", "#b5651d"))
        .with_material(Material::new("Glass"))
        .with_material(Material::new("Oak"))
        .with_style("Contemporary")
        .with_project_type("residential")
        .with_attribute("roof", json!({ "form": "gable", "pitch": 35.0 }))
        .with_attribute("rooms", json!(["kitchen", "living", "bed 1", "bed 2"]))
}

fn bench_pipeline(c: &mut Criterion) {
    let dna = sample_dna();
    let site = SiteContext::default();

    c.bench_function("fingerprint_dna", |b| b.iter(|| fingerprint(&dna)));

    c.bench_function("plan_arch_sheet", |b| {
        b.iter(|| plan_panels(&dna, &site, SheetType::Arch))
    });

    c.bench_function("layout_arch_1792x1269", |b| {
        b.iter(|| compute_layout(1792, 1269, SheetType::Arch, UK_RIBA_STANDARD))
    });

    if let Ok(plan) = plan_panels(&dna, &site, SheetType::Arch) {
        c.bench_function("prompts_arch_sheet", |b| {
            b.iter(|| PromptSet::build(&plan, &GenerationMode::Generate))
        });
    }

    let base = normalize(&dna);
    let mut changed = dna.clone();
    changed.dimensions.length = 16.0;
    let candidate = normalize(&changed);
    c.bench_function("compare_dna", |b| b.iter(|| compare_dna(&base, &candidate)));

    let img = DMatrix::<f64>::from_fn(256, 256, |r, c| ((r * 31 + c * 17) % 97) as f64 / 96.0);
    let other = img.map(|v| (v * 0.9 + 0.05).min(1.0));
    let ssim = Ssim::default();
    c.bench_function("ssim_256x256", |b| b.iter(|| ssim.similarity(&img, &other)));
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
