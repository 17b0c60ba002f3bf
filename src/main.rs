use anyhow::Context;
use clap::Parser;
use libprep_core::app::recipes::{depth_schedule, step_recipe::describe};
use libprep_core::config::toml_config::StepConfig;
use libprep_core::core::TipLedger;
use libprep_core::utils::error::ErrorSeverity;
use libprep_core::utils::{logger, validation::Validate};
use libprep_core::{
    CliConfig, JsonCountStore, NoopCountStore, ProtocolConfig, ProtocolEngine, ProtocolError,
    SimulatedPipette, StepRecipe, TerminalConsole, TipSupplyTracker, ToneCommand,
};

fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting libprep");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = ProtocolConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be executed");
        perform_dry_run(&config)?;
        return Ok(());
    }

    let count_file = args
        .count_file
        .clone()
        .or_else(|| config.count_file().map(str::to_string));

    let result = match count_file {
        Some(path) => run(config, &args, JsonCountStore::new(path)),
        None => run(config, &args, NoopCountStore),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                "❌ Protocol run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

fn run<S: libprep_core::core::CountStore>(
    config: ProtocolConfig,
    args: &CliConfig,
    store: S,
) -> Result<(), ProtocolError> {
    let tone = config
        .tone_file()
        .filter(|_| config.tone_enabled())
        .map(|file| ToneCommand::new(config.tone_player(), file));
    let console = TerminalConsole::new(args.auto_ack).with_tone(tone);
    let tips = TipSupplyTracker::with_supplies(config.exhaustion_signal(), config.tip_supplies());
    let estimator = config.estimator();

    let recipe = StepRecipe::new(
        config,
        tips,
        estimator,
        SimulatedPipette::new(),
        console,
        store,
    )?
    .with_reset_counts(args.reset_counts);

    let mut engine = ProtocolEngine::new(recipe);
    let summary = engine.run()?;

    println!("✅ Protocol completed successfully!");
    println!("  Steps: {}", summary.steps_executed);
    println!("  Tips used: {}", summary.tips_used);
    println!("  Rack replacements: {}", summary.rack_replacements);
    println!("  Volume transferred: {:.2} µl", summary.volume_transferred);
    for (tool, used) in engine.recipe().tips().counts() {
        println!("  Tool {}: {} tips used since last rack change", tool, used);
    }
    for (reservoir, volume) in &summary.remaining_volumes {
        println!("  Reservoir {}: {:.2} µl left", reservoir, volume);
    }
    Ok(())
}

fn display_config_summary(config: &ProtocolConfig, args: &CliConfig) {
    println!("📋 Configuration Summary:");
    println!(
        "  Protocol: {} v{}",
        config.protocol.name, config.protocol.version
    );
    if let Some(author) = &config.protocol.author {
        println!("  Author: {}", author);
    }
    for supply in config.tip_supplies() {
        println!(
            "  Tool {}: {} racks ({}), {} positions",
            supply.tool_id,
            supply.racks.len(),
            supply.racks.join(", "),
            supply.capacity()
        );
    }
    for (tool, rate) in config.flow_rates() {
        println!(
            "  Tool {} flow rate: aspirate {} / dispense {} µl/s",
            tool, rate.aspirate, rate.dispense
        );
    }
    let estimator = config.estimator();
    println!(
        "  Well geometry: diameter {} mm, bottom offset {} mm, blow-out clearance {} mm",
        estimator.well_diameter,
        estimator.bottom_offset,
        config.clearance_height()
    );
    println!("  Steps: {}", config.steps.len());
    if let Some(path) = args.count_file.as_deref().or(config.count_file()) {
        println!("  Tip count file: {}", path);
    }
    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn perform_dry_run(config: &ProtocolConfig) -> Result<(), ProtocolError> {
    println!("🔍 Dry Run Analysis:");
    println!();

    for (index, step) in config.steps.iter().enumerate() {
        println!("  {}. {}", index + 1, describe(step));
        if let StepConfig::Pause { attention, .. } = step {
            if attention.unwrap_or(true) {
                println!("     💡 attention signal: {} toggles", config.pause_signal().toggles);
            }
        }
    }

    let schedules = depth_schedule(config, &config.estimator())?;
    if !schedules.is_empty() {
        println!();
        println!("🧪 Aspirate depth schedule (mm above well bottom):");
        for schedule in schedules {
            let depths: Vec<String> = schedule
                .depths
                .iter()
                .map(|d| format!("{:.2}", d))
                .collect();
            println!(
                "  Step {} from {} ({} µl each): {}",
                schedule.step_index + 1,
                schedule.reservoir,
                schedule.volume,
                depths.join(", ")
            );
        }
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during an actual run.");
    Ok(())
}
