use anirename::api::{apply_env_overrides, AniListClient, MetadataLookup};
use anirename::apply::{Applier, ApplyError, LocalApplier};
use anirename::cache::{CacheConfig, CacheStore, CachedLookup};
use anirename::cli::Args;
use anirename::config::Settings;
use anirename::error::AppError;
use anirename::logging;
use anirename::mapper::SpecialsPolicy;
use anirename::matcher::{Choice, PendingChoice};
use anirename::output::{display_dry_run, display_execution_result, display_problems};
use anirename::pipeline::{apply_directory, DirectoryOutcome, Planner, PlannerOptions};
use anirename::progress::{should_use_colors, Progress};
use anirename::rename::{DirectoryPlan, RenamePlanEntry};
use anirename::scanlog::{MemoryScanLog, ProcessedDirectories, ScanLog};
use anirename::scanner::{scan_media, MediaDirectory};
use anirename::ui::ChoicePrompt;
use clap::Parser;
use std::io::{self, IsTerminal};
use std::sync::atomic::AtomicBool;
use tracing::{debug, error, info, warn};

fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(args.verbose);

    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("\nError: {}", e.detailed_message());
        std::process::exit(e.exit_code().into());
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let settings = Settings::load(args.config.as_deref())?;
    let mut progress = Progress::new(args.verbose > 0);

    if args.reset_scan_log {
        let path = settings
            .scan_log_path()
            .ok_or_else(|| AppError::Other("No data directory for the scan log".to_string()))?;
        ScanLog::open(&path)?.reset()?;
        info!("Scan log at {:?} reset", path);
    }

    let Some(target_dir) = &args.target_dir else {
        return Ok(());
    };

    progress.scan_start(target_dir, args.recursive);
    let directories = scan_media(target_dir, args.recursive)?;
    progress.scan_complete(directories.len());

    if directories.is_empty() {
        println!("No video or subtitle files found to process.");
        return Ok(());
    }

    let mut scan_log: Box<dyn ProcessedDirectories> = if args.incremental {
        let path = settings
            .scan_log_path()
            .ok_or_else(|| AppError::Other("No data directory for the scan log".to_string()))?;
        Box::new(ScanLog::open(&path)?)
    } else {
        Box::new(MemoryScanLog::new())
    };

    let client = AniListClient::new(apply_env_overrides(settings.api.clone()))?;
    let options = planner_options(&args, &settings)?;

    if !settings.lookup_cache.enabled {
        return process(&args, options, client, &directories, scan_log.as_mut(), &mut progress);
    }

    let hours = settings.lookup_cache.duration_hours;
    let cache_config = match &settings.cache_dir {
        Some(dir) => Some(CacheConfig::in_dir(dir, hours)),
        None => CacheConfig::for_user_home(hours),
    };
    let Some(cache_config) = cache_config else {
        warn!("No cache directory available, lookups will not be cached");
        return process(&args, options, client, &directories, scan_log.as_mut(), &mut progress);
    };

    let mut store = CacheStore::load(cache_config);
    let pruned = store.prune_expired();
    if pruned > 0 {
        debug!("Pruned {} expired lookup cache entries", pruned);
    }
    let lookup = CachedLookup::new(client, store, args.force_refresh);
    let result = process(&args, options, &lookup, &directories, scan_log.as_mut(), &mut progress);
    if let Err(e) = lookup.save() {
        warn!("Failed to save lookup cache: {}", e);
    }
    result
}

fn planner_options(args: &Args, settings: &Settings) -> Result<PlannerOptions, AppError> {
    let specials = if args.bundle_ova {
        SpecialsPolicy::Bundle
    } else {
        settings.specials
    };

    Ok(PlannerOptions {
        title_language: settings.title_language,
        naming: settings.name_builder_config()?,
        matching: settings.match_config(),
        specials,
        incremental: args.incremental,
        force_refresh: args.force_refresh,
    })
}

/// Renames files through `LocalApplier` while reporting each move
struct ReportingApplier<'a> {
    progress: &'a mut Progress,
    current: usize,
    total: usize,
}

impl Applier for ReportingApplier<'_> {
    fn apply(&mut self, entry: &RenamePlanEntry) -> Result<(), ApplyError> {
        self.current += 1;
        self.progress.rename_progress(
            self.current,
            self.total,
            &entry.source_name(),
            &entry.target_name(),
        );
        LocalApplier.apply(entry)
    }
}

fn process<L: MetadataLookup>(
    args: &Args,
    options: PlannerOptions,
    lookup: L,
    directories: &[MediaDirectory],
    scan_log: &mut dyn ProcessedDirectories,
    progress: &mut Progress,
) -> Result<(), AppError> {
    let mut planner = Planner::new(lookup, options);
    let interactive = args.interactive || (!args.batch && io::stdin().is_terminal());
    let mut prompt = ChoicePrompt::stdio(should_use_colors());
    let interrupted = AtomicBool::new(false);

    let total = directories.len();
    let mut failed = 0;
    let mut renamed = 0;
    let mut skipped = 0;

    for (i, directory) in directories.iter().enumerate() {
        progress.directory_start(i + 1, total, &directory.path);

        let plan = loop {
            match planner.plan_directory(directory, &*scan_log) {
                Ok(DirectoryOutcome::NeedsDecision(pending)) => {
                    let choice = decide(&pending, interactive, &mut prompt, progress)?;
                    planner
                        .resolve(&pending, choice)
                        .map_err(|e| AppError::Other(e.to_string()))?;
                }
                Ok(DirectoryOutcome::AlreadyProcessed(_)) => {
                    progress.already_processed();
                    break None;
                }
                Ok(DirectoryOutcome::Planned(plan)) => break Some(plan),
                Err(e) => {
                    error!(directory = %directory.path.display(), "{}", e);
                    progress.warn(&format!("{}: {}", directory.path.display(), e));
                    failed += 1;
                    break None;
                }
            }
        };
        let Some(plan) = plan else {
            continue;
        };

        skipped += plan.skipped.len();
        if args.dry {
            renamed += plan.pending_count();
            display_dry_run(&plan, &mut io::stdout()).map_err(output_error)?;
            continue;
        }

        match apply_plan(&plan, scan_log, &interrupted, progress) {
            Ok(count) => renamed += count,
            Err(e) => {
                error!(directory = %directory.path.display(), "{}", e);
                progress.warn(&e.to_string());
                failed += 1;
            }
        }
    }

    progress.run_complete(renamed, skipped, args.dry);

    if failed > 0 {
        return Err(AppError::PartialFailure { failed, total });
    }
    Ok(())
}

/// Apply one plan; errors abandon the directory
fn apply_plan(
    plan: &DirectoryPlan,
    scan_log: &mut dyn ProcessedDirectories,
    interrupted: &AtomicBool,
    progress: &mut Progress,
) -> Result<usize, AppError> {
    let mut applier = ReportingApplier {
        progress,
        current: 0,
        total: plan.pending_count(),
    };
    let mut report = apply_directory(plan, &mut applier, scan_log, interrupted)?;

    let mut stdout = io::stdout();
    display_problems(plan, &mut stdout).map_err(output_error)?;
    display_execution_result(plan, &report, &mut stdout).map_err(output_error)?;

    let count = report.applied.len();
    match report.failure.take() {
        Some((_, e)) => Err(e.into()),
        None if report.interrupted => Err(AppError::Other(format!(
            "Interrupted while renaming {}",
            plan.directory.display()
        ))),
        None => Ok(count),
    }
}

fn decide<R: io::BufRead, W: io::Write>(
    pending: &PendingChoice,
    interactive: bool,
    prompt: &mut ChoicePrompt<R, W>,
    progress: &mut Progress,
) -> Result<Choice, AppError> {
    if !interactive {
        debug!("Not interactive, skipping ambiguous title '{}'", pending.token);
        progress.warn(&format!("{}; skipping (use --interactive to choose)", pending));
        return Ok(Choice::Skip);
    }
    prompt.ask(pending).map_err(output_error)
}

fn output_error(e: io::Error) -> AppError {
    AppError::Other(format!("Failed to display output: {}", e))
}
