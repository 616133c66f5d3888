use eframe::{NativeOptions, egui};
use smoke::{
    about, app,
    config::ExplorerConfig,
    controller::ExplorerController,
    query::{HttpTransport, ScenarioQueryClient},
    telemetry,
};
use smoke_protocol::BootPayload;
use std::{env, fs};
use tracing::info;

fn usage() {
    eprintln!(
        "Usage:\n  \
  smoke_explorer [--config PATH] [--backend URL] [--boot FILE] [--offline-regions DIR]\n  \
  smoke_explorer --version"
    );
}

struct Args {
    config: Option<String>,
    backend: Option<String>,
    boot: Option<String>,
    offline_regions: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        config: None,
        backend: None,
        boot: None,
        offline_regions: None,
    };
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let slot = match flag.as_str() {
            "--config" => &mut parsed.config,
            "--backend" => &mut parsed.backend,
            "--boot" => &mut parsed.boot,
            "--offline-regions" => &mut parsed.offline_regions,
            other => {
                usage();
                return Err(format!("Unknown argument '{other}'"));
            }
        };
        *slot = Some(
            iter.next()
                .ok_or_else(|| format!("{flag} needs a value"))?
                .clone(),
        );
    }
    Ok(parsed)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    telemetry::init();
    let args = parse_args(&args).map_err(anyhow::Error::msg)?;

    let mut config = ExplorerConfig::load_or_default(args.config.as_deref())?;
    if let Some(url) = args.backend {
        config.backend_url = url;
    }
    if args.offline_regions.is_some() {
        config.regions_dir = args.offline_regions;
    }
    config.validate()?;

    let transport = HttpTransport::new(
        &config.backend_url,
        config.request_timeout(),
        config.region_source(),
    )?;
    let client = ScenarioQueryClient::new(transport);
    let mut controller = ExplorerController::new(config);

    // Without a boot payload the first result comes from a default query.
    let pending_regions = match args.boot {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Could not read boot payload '{path}': {e}"))?;
            let boot = BootPayload::from_json_str(&text)?;
            Some(controller.install_boot(&boot)?)
        }
        None => None,
    };
    let needs_initial_query = pending_regions.is_none();
    info!(
        backend = %controller.config().backend_url,
        needs_initial_query,
        "starting explorer"
    );

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("Smoke exposure explorer"),
        ..Default::default()
    };

    eframe::run_native(
        "Smoke exposure explorer",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(app::SmokeApp::new(
                controller,
                client,
                needs_initial_query,
                pending_regions,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Could not start the window: {e}"))
}
