use serde::Serialize;
use smoke::{
    about,
    boundaries::{list_region_ids, parse_region_geojson},
    config::ExplorerConfig,
    controller::ExplorerController,
    query::{HttpTransport, ScenarioQueryClient},
    scenario::{PieSlice, ScenarioResult},
    telemetry,
};
use smoke_protocol::{BootPayload, DetailsResponse};
use std::{env, fs, path::Path};

fn usage() {
    eprintln!(
        "Usage:\n  \
  smoke_cli --version\n  \
  smoke_cli [GLOBAL] query [--receptor R] [--scenario S] [--met-year Y] [--emiss-year Y] [--protect a,b,..]\n  \
  smoke_cli [GLOBAL] tile-url @details.json GROUP VARIANT Z X Y\n  \
  smoke_cli [GLOBAL] regions DIR\n  \
  smoke_cli [GLOBAL] boot-summary @boot.json\n\n  \
  GLOBAL: --config PATH  --backend URL  --offline-regions DIR\n  \
  Protectable areas: logging, oilpalm, timber, peatlands, conservation\n  \
  Tip: pass @file.json instead of inline JSON"
    );
}

fn load_json_arg(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("Could not read JSON file '{path}': {e}"))
    } else {
        Ok(value.to_string())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {name} '{value}'"))
}

/// Consumes leading global flags; returns the config and the command index.
fn parse_global_args(args: &[String]) -> Result<(ExplorerConfig, usize), String> {
    let mut config_path = None;
    let mut backend = None;
    let mut regions_dir = None;
    let mut idx = 1;
    while idx < args.len() {
        let slot = match args[idx].as_str() {
            "--config" => &mut config_path,
            "--backend" => &mut backend,
            "--offline-regions" => &mut regions_dir,
            _ => break,
        };
        let value = args
            .get(idx + 1)
            .ok_or_else(|| format!("{} needs a value", args[idx]))?;
        *slot = Some(value.clone());
        idx += 2;
    }
    let mut config =
        ExplorerConfig::load_or_default(config_path.as_deref()).map_err(|e| e.to_string())?;
    if let Some(url) = backend {
        config.backend_url = url;
    }
    if regions_dir.is_some() {
        config.regions_dir = regions_dir;
    }
    Ok((config, idx))
}

fn build_client(config: &ExplorerConfig) -> Result<ScenarioQueryClient<HttpTransport>, String> {
    let transport = HttpTransport::new(
        &config.backend_url,
        config.request_timeout(),
        config.region_source(),
    )
    .map_err(|e| e.to_string())?;
    Ok(ScenarioQueryClient::new(transport))
}

#[derive(Serialize)]
struct ResultSummary {
    total_pm: f64,
    contribution_title: String,
    contributions: Vec<PieSlice>,
    monthly: Vec<(String, f64)>,
    deaths_central: f64,
    deaths_range: String,
    tile_groups: Vec<usize>,
}

fn summarize(result: &ScenarioResult) -> ResultSummary {
    ResultSummary {
        total_pm: result.total_pm,
        contribution_title: result.provincial.title(),
        contributions: result.provincial.slices(),
        monthly: result
            .timeseries
            .iter()
            .map(|m| (m.label.clone(), m.value))
            .collect(),
        deaths_central: result.mortality.total().central,
        deaths_range: result.mortality.range_label(),
        tile_groups: (0..result.tiles.group_count())
            .map(|g| result.tiles.variant_count(g))
            .collect(),
    }
}

fn run_query(config: ExplorerConfig, args: &[String]) -> Result<(), String> {
    let mut query = config.default_query.clone();
    let mut idx = 0;
    while idx < args.len() {
        let value = args
            .get(idx + 1)
            .ok_or_else(|| format!("{} needs a value", args[idx]))?;
        match args[idx].as_str() {
            "--receptor" => query.receptor = value.clone(),
            "--scenario" => query.scenario = value.clone(),
            "--met-year" => query.met_year = parse_number("met year", value)?,
            "--emiss-year" => query.emiss_year = parse_number("emissions year", value)?,
            "--protect" => {
                for area in value.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                    match area {
                        "logging" => query.logging = true,
                        "oilpalm" => query.oilpalm = true,
                        "timber" => query.timber = true,
                        "peatlands" => query.peatlands = true,
                        "conservation" => query.conservation = true,
                        other => return Err(format!("Unknown protected area '{other}'")),
                    }
                }
            }
            other => return Err(format!("Unknown query option '{other}'")),
        }
        idx += 2;
    }
    let client = build_client(&config)?;
    let result = client.fetch(&query).map_err(|e| e.to_string())?;
    print_json(&summarize(&result))
}

fn run_tile_url(config: &ExplorerConfig, args: &[String]) -> Result<(), String> {
    let [source, group, variant, z, x, y] = args else {
        usage();
        return Err("tile-url needs SOURCE GROUP VARIANT Z X Y".to_string());
    };
    let response =
        DetailsResponse::from_json_str(&load_json_arg(source)?).map_err(|e| e.to_string())?;
    let tiles = smoke_protocol::TileCredentialTable::from_embedded(
        response.ee_map_id.as_deref(),
        response.ee_token.as_deref(),
    )
    .map_err(|e| e.to_string())?;
    let (group, variant): (usize, usize) =
        (parse_number("group", group)?, parse_number("variant", variant)?);
    let credential = tiles
        .get(group, variant)
        .ok_or_else(|| format!("No tile credential for group {group} variant {variant}"))?;
    println!(
        "{}",
        credential.tile_url(
            &config.ee_base_url,
            parse_number("x", x)?,
            parse_number("y", y)?,
            parse_number("zoom", z)?,
        )
    );
    Ok(())
}

#[derive(Serialize)]
struct RegionSummary {
    id: String,
    name: Option<String>,
    polygons: usize,
    error: Option<String>,
}

fn run_regions(dir: &str) -> Result<(), String> {
    let dir = Path::new(dir);
    let ids = list_region_ids(dir).map_err(|e| e.to_string())?;
    let summaries: Vec<RegionSummary> = ids
        .into_iter()
        .map(|id| {
            let parsed = fs::read_to_string(dir.join(format!("{id}.json")))
                .map_err(|e| e.to_string())
                .and_then(|text| parse_region_geojson(&id, &text));
            match parsed {
                Ok(region) => RegionSummary {
                    name: region.name.clone(),
                    polygons: region.polygons.len(),
                    id,
                    error: None,
                },
                Err(e) => RegionSummary {
                    id,
                    name: None,
                    polygons: 0,
                    error: Some(e),
                },
            }
        })
        .collect();
    print_json(&summaries)
}

#[derive(Serialize)]
struct BootSummary {
    result: ResultSummary,
    active_layers: Vec<&'static str>,
    regions_loaded: Vec<String>,
    regions_failed: Vec<(String, String)>,
}

fn run_boot_summary(config: ExplorerConfig, source: &str) -> Result<(), String> {
    let boot = BootPayload::from_json_str(&load_json_arg(source)?).map_err(|e| e.to_string())?;
    let client = build_client(&config)?;
    let mut controller = ExplorerController::new(config);
    controller
        .boot(&boot, client.transport())
        .map_err(|e| e.to_string())?;
    let result = controller
        .result()
        .ok_or_else(|| "Boot produced no result".to_string())?;
    print_json(&BootSummary {
        result: summarize(result),
        active_layers: controller
            .overlays()
            .active_kinds()
            .into_iter()
            .map(|k| k.as_str())
            .collect(),
        regions_loaded: controller
            .boundaries()
            .loaded()
            .map(|r| r.id.clone())
            .collect(),
        regions_failed: controller
            .boundaries()
            .failures()
            .map(|(id, e)| (id.to_string(), e.to_string()))
            .collect(),
    })
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    telemetry::init_with("warn");
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (config, cmd_idx) = parse_global_args(&args)?;
    let Some(command) = args.get(cmd_idx) else {
        usage();
        return Err("Missing command".to_string());
    };
    let rest = &args[cmd_idx + 1..];

    match command.as_str() {
        "query" => run_query(config, rest),
        "tile-url" => run_tile_url(&config, rest),
        "regions" => match rest {
            [dir] => run_regions(dir),
            _ => Err("regions needs DIR".to_string()),
        },
        "boot-summary" => match rest {
            [source] => run_boot_summary(config, source),
            _ => Err("boot-summary needs SOURCE".to_string()),
        },
        other => {
            usage();
            Err(format!("Unknown command '{other}'"))
        }
    }
}
