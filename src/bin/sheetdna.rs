//! SheetDNA CLI — inspect the deterministic sheet pipeline
//!
//! Commands:
//!   sheetdna hash     — canonical fingerprint of a DNA file
//!   sheetdna plan     — planned panels and seeds for a sheet
//!   sheetdna layout   — computed slot rectangles
//!   sheetdna prompt   — generation prompt for one panel
//!   sheetdna compare  — DNA drift between two files
//!   sheetdna demo     — baseline, accepted modify and rejected modify

use sheetdna_core::bundle::{
    apply_modify, create_baseline, BaselineDraft, BundleStore, CandidateArtifacts,
    MemoryBundleStore,
    ModifyRequest,
};
use sheetdna_core::dna::{normalize, DesignDna, Material};
use sheetdna_core::drift::{compare_dna, validate_drift};
use sheetdna_core::layout::{compute_layout_with, validate_layout};
use sheetdna_core::panel::{PanelType, SheetType};
use sheetdna_core::planner::{QuickToggle, SiteContext};
use sheetdna_core::prompt::{build_panel_prompt, GenerationMode, PromptInputs, PromptSet};
use sheetdna_core::provider::{
    generate_sheet, GenerationRequest, GenerationResponse, ImageProvider, ProviderError,
};
use sheetdna_core::seed::derive_seed;
use sheetdna_core::PipelineConfig;
use std::env;
use std::future::Future;

const CONFIG_FILE: &str = "sheetdna.json";

fn print_usage() {
    println!(
        r#"
SheetDNA v0.1 — deterministic architectural sheet pipeline

Usage: sheetdna <command> [options]

Commands:
  hash     <dna.json>                        Canonical DNA fingerprint
  plan     <dna.json> [sheet]                Planned panels with seeds
  layout   [width height sheet key]          Slot rectangles for a canvas
  prompt   <dna.json> <panel-id> [sheet]     Prompt for one panel
  compare  <a.json> <b.json> [--strict]      DNA drift and verdict
  demo                                       Baseline + modify walkthrough

Sheets: ARCH (default), CONCEPT, TECHNICAL
Configuration is read from ./sheetdna.json when present.

Examples:
  sheetdna hash house.json
  sheetdna plan house.json TECHNICAL
  sheetdna layout 1792 1269 ARCH uk-riba-standard
  sheetdna prompt house.json elevation_north
  sheetdna compare house.json house-v2.json --strict
"#
    );
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    let config = match PipelineConfig::load_or_default(CONFIG_FILE) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  Failed to load {}: {}", CONFIG_FILE, e);
            std::process::exit(2);
        }
    };

    let result = match args[1].as_str() {
        "hash" => cmd_hash(&args[2..]),
        "plan" => cmd_plan(&config, &args[2..]),
        "layout" => cmd_layout(&config, &args[2..]),
        "prompt" => cmd_prompt(&config, &args[2..]),
        "compare" => cmd_compare(&config, &args[2..]),
        "demo" => cmd_demo(&config).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("  Error: {}", e);
        std::process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn load_dna(path: &str) -> Result<DesignDna, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(DesignDna::from_json_str(&json)?)
}

fn sheet_arg(args: &[String], index: usize) -> Result<SheetType, Box<dyn std::error::Error>> {
    match args.get(index) {
        Some(s) => Ok(s.parse()?),
        None => Ok(SheetType::Arch),
    }
}

fn cmd_hash(args: &[String]) -> CmdResult {
    let Some(path) = args.first() else {
        eprintln!("Usage: sheetdna hash <dna.json>");
        return Ok(());
    };
    let dna = load_dna(path)?;
    dna.validate()?;
    let normalized = normalize(&dna);
    println!("  DNA: {}", dna.summary());
    println!("  Fingerprint: {}", normalized.fingerprint());
    println!("  Canonical:   {}", serde_json::to_string(&normalized.to_dna())?);
    Ok(())
}

fn cmd_plan(config: &PipelineConfig, args: &[String]) -> CmdResult {
    let Some(path) = args.first() else {
        eprintln!("Usage: sheetdna plan <dna.json> [sheet]");
        return Ok(());
    };
    let sheet = sheet_arg(args, 1)?;
    let plan = config.planner().plan(&load_dna(path)?, &SiteContext::default(), sheet)?;

    println!(
        "  {} sheet, dna {}, sheet seed {}",
        plan.sheet_type,
        plan.fingerprint.short(),
        plan.sheet_seed
    );
    println!("  {:<24} {:>12}  title", "panel", "seed");
    println!("  {}", "-".repeat(60));
    for job in &plan.jobs {
        println!("  {:<24} {:>12}  {}", job.panel.id(), job.seed, job.panel.title());
    }

    let layout = compute_layout_with(
        &config.catalog,
        config.canvas.width,
        config.canvas.height,
        sheet,
        &config.layout_key,
    )?;
    let check = validate_layout(&layout, &plan.panels(), config.missing_slot_policy);
    for warning in &check.warnings {
        println!("  warning: {}", warning);
    }
    if !check.valid {
        return Err(
            format!("layout '{}' cannot place every planned panel", config.layout_key).into(),
        );
    }
    Ok(())
}

fn cmd_layout(config: &PipelineConfig, args: &[String]) -> CmdResult {
    let width = match args.first() {
        Some(w) => w.parse()?,
        None => config.canvas.width,
    };
    let height = match args.get(1) {
        Some(h) => h.parse()?,
        None => config.canvas.height,
    };
    let sheet = sheet_arg(args, 2)?;
    let key = args.get(3).cloned().unwrap_or_else(|| config.layout_key.clone());

    let layout = compute_layout_with(&config.catalog, width, height, sheet, &key)?;
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}

fn cmd_prompt(config: &PipelineConfig, args: &[String]) -> CmdResult {
    if args.len() < 2 {
        eprintln!("Usage: sheetdna prompt <dna.json> <panel-id> [sheet]");
        return Ok(());
    }
    let dna = load_dna(&args[0])?;
    let panel: PanelType = args[1].parse()?;
    let sheet = sheet_arg(args, 2)?;
    let plan = config.planner().plan(&dna, &SiteContext::default(), sheet)?;

    let seed = plan
        .job(panel)
        .map(|j| j.seed)
        .unwrap_or_else(|| derive_seed(&plan.fingerprint, panel));
    let inputs = PromptInputs {
        dna: &plan.dna,
        site: &plan.site,
        mode: &GenerationMode::Generate,
        seed,
        fingerprint: plan.fingerprint,
    };
    let prompt = build_panel_prompt(panel, &inputs);
    println!("{}", serde_json::to_string_pretty(&prompt)?);
    Ok(())
}

fn cmd_compare(config: &PipelineConfig, args: &[String]) -> CmdResult {
    if args.len() < 2 {
        eprintln!("Usage: sheetdna compare <a.json> <b.json> [--strict]");
        return Ok(());
    }
    let strict = args[2..].iter().any(|a| a == "--strict");
    let a = load_dna(&args[0])?;
    let b = load_dna(&args[1])?;
    a.validate()?;
    b.validate()?;

    let comparison = compare_dna(&normalize(&a), &normalize(&b));
    let report = validate_drift(
        &comparison,
        None,
        &config.thresholds,
        config.non_critical_policy,
        strict,
    );

    println!(
        "  Drift: {:.3} ({} of {} attributes)",
        comparison.drift,
        comparison.changes.len(),
        comparison.compared
    );
    for change in &comparison.changes {
        println!(
            "    {:<32} {} -> {}",
            change.path,
            change.old.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            change.new.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".into())
        );
    }
    println!("  Verdict: {:?}{}", report.verdict, if strict { " (strict lock)" } else { "" });
    for reason in &report.reasons {
        println!("    {}", reason);
    }
    Ok(())
}

/// Echoes seeds and invents in-memory image references
struct DemoProvider;

impl ImageProvider for DemoProvider {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResponse, ProviderError>> + Send {
        async move {
            Ok(GenerationResponse {
                image_references: vec![format!(
                    "mem://demo/{}-{}.png",
                    request.panel, request.seed
                )],
                seed_used: Some(request.seed),
                provider_model: "demo".to_string(),
                latency_ms: 1,
                trace_id: None,
            })
        }
    }
}

async fn cmd_demo(config: &PipelineConfig) -> CmdResult {
    println!("\n  === SheetDNA demo ===\n");

    let dna = DesignDna::new(15.0, 12.0, 7.0, 2)
        .with_material(Material::with_color("Red Brick", "#B5651D"))
        .with_material(Material::new("Glass"))
        .with_style("Contemporary")
        .with_project_type("residential");
    let site = SiteContext {
        boundary: vec![[0.0, 0.0], [30.0, 0.0], [30.0, 25.0], [0.0, 25.0]],
        climate: Some("Cfb".to_string()),
        orientation_deg: 15.0,
        location: Some("Bristol, UK".to_string()),
    };

    // 1. Plan, lay out, prompt, generate
    let planner = config.planner();
    let plan = planner.plan(&dna, &site, SheetType::Arch)?;
    let layout = compute_layout_with(
        &config.catalog,
        config.canvas.width,
        config.canvas.height,
        SheetType::Arch,
        &config.layout_key,
    )?;
    let prompts = PromptSet::build(&plan, &GenerationMode::Generate);
    let run = generate_sheet(&DemoProvider, &plan, &layout, &prompts, &config.generation).await;
    println!("  1. Generated {} panels (dna {})", run.outcomes.len(), plan.fingerprint.short());

    // 2. Baseline
    let artifacts = run.into_artifacts()?;
    let baseline = create_baseline(BaselineDraft::from_plan(
        "demo-house",
        "arch-a1",
        &plan,
        layout.clone(),
        artifacts,
    ))?;
    let store = MemoryBundleStore::new();
    store.put(baseline.clone())?;
    println!(
        "  2. Baseline v{} stored, lineage {}",
        baseline.version,
        &baseline.metadata.lineage.root_hash[..12]
    );

    // 3. Accepted modify: add sections, same DNA
    let request = ModifyRequest::new("demo-house", "arch-a1").with_toggle(QuickToggle::AddSections);
    let modify_plan = planner.plan_with_toggles(&dna, &site, SheetType::Arch, &request.toggles)?;
    let prompts = PromptSet::build(&modify_plan, &baseline.modify_mode(&request));
    let run =
        generate_sheet(&DemoProvider, &modify_plan, &layout, &prompts, &config.generation).await;
    let candidate = CandidateArtifacts::new(dna.clone(), run.into_artifacts()?);
    let next = apply_modify(&baseline, &request, candidate, &config.validator())?;
    store.put(next.clone())?;
    println!("  3. Modify accepted: v{} -> v{}", baseline.version, next.version);

    // 4. Rejected modify: strict lock with a changed footprint and style
    let mut drifted = dna.clone();
    drifted.dimensions.length = 18.0;
    drifted.style = Some("Brutalist".to_string());
    let request = ModifyRequest::new("demo-house", "arch-a1").strict();
    let candidate = CandidateArtifacts::new(drifted, next.panels.clone());
    match apply_modify(&next, &request, candidate, &config.validator()) {
        Ok(bundle) => println!("  4. Unexpectedly accepted v{}", bundle.version),
        Err(rejection) => {
            println!("  4. Modify rejected: {}", rejection);
            for change in rejection.changes() {
                println!("       changed {}", change.path);
            }
        }
    }

    println!("\n  Stored versions: {:?}", store.versions(&baseline.key())?);
    Ok(())
}
