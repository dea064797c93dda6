use cdjcheck::remediation::ffmpeg::Converter;
use cdjcheck::report::{display_path, Summary};
use cdjcheck::scan::{self, ScanOutcome};
use cdjcheck::{
    ClassificationResult, Classifier, ConversionError, OutputLayout, Planner, RemediationPlan,
    RuleTable, SymphoniaProbe,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cdjcheck")]
#[command(author, version, about = "Check audio files against CDJ playback limits and convert the ones that fail")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Rules file (TOML) replacing the built-in CDJ table
    #[arg(long, global = true, env = "CDJCHECK_RULES")]
    rules: Option<PathBuf>,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// Show debug logging and extra detail
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a file or directory and write a compatibility report
    Scan {
        /// File or directory to scan
        path: PathBuf,

        /// Output report file (.txt, .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for auto-generated reports
        #[arg(long, default_value = "cdjcheck-reports")]
        report_dir: PathBuf,

        /// Don't write a report
        #[arg(long)]
        no_report: bool,

        /// Open the report when done
        #[arg(long)]
        open: bool,

        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,
    },

    /// Convert incompatible files into a separate directory
    Convert {
        /// File or directory to scan
        path: PathBuf,

        /// Directory that receives converted copies (must be outside PATH)
        #[arg(long, default_value = "converted")]
        out: PathBuf,

        /// Print the conversion plan without running ffmpeg
        #[arg(long)]
        dry_run: bool,

        /// Replace files that already exist in the output directory
        #[arg(long)]
        overwrite: bool,

        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,

        /// ffmpeg binary to run
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },

    /// Print the active rule table as TOML
    Rules,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let rules = match args.rules {
        Some(ref path) => match RuleTable::load(path) {
            Ok(rules) => rules,
            Err(e) => fail(&format!("Failed to load rules: {}", e)),
        },
        None => RuleTable::cdj(),
    };

    // Set up thread pool
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let code = match args.command {
        Command::Scan {
            ref path,
            ref output,
            ref report_dir,
            no_report,
            open,
            no_recursive,
        } => run_scan(
            &args,
            rules,
            path,
            ReportOptions {
                output: output.clone(),
                report_dir: report_dir.clone(),
                no_report,
                open,
            },
            !no_recursive,
        ),
        Command::Convert {
            ref path,
            ref out,
            dry_run,
            overwrite,
            no_recursive,
            ref ffmpeg,
        } => {
            let converter = Converter::new()
                .with_ffmpeg(ffmpeg.clone())
                .with_overwrite(overwrite);
            run_convert(&args, rules, path, out, &converter, dry_run, !no_recursive)
        }
        Command::Rules => match rules.to_toml_string() {
            Ok(text) => {
                print!("{}", text);
                0
            }
            Err(e) => fail(&format!("Failed to serialize rules: {}", e)),
        },
    };

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cdjcheck=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

struct ReportOptions {
    output: Option<PathBuf>,
    report_dir: PathBuf,
    no_report: bool,
    open: bool,
}

/// Collect, extract and classify with a progress bar. Fatal if the input
/// cannot be enumerated.
fn scan_with_progress(args: &Args, classifier: &Classifier, path: &Path, recursive: bool) -> ScanOutcome {
    let files = match scan::collect_files(path, recursive) {
        Ok(files) => files,
        Err(e) => fail(&format!("Cannot read {}: {}", path.display(), e)),
    };

    if files.is_empty() {
        eprintln!("No audio files found (supported: wav, aiff, flac, mp3, m4a, aac, ogg, opus)");
    }

    if !args.quiet {
        eprintln!("\x1b[1mcdjcheck - CDJ Compatibility Check\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} audio file(s)\n", files.len());
    }

    let pb = progress_bar(args, files.len());
    let outcome = scan::scan(&files, &SymphoniaProbe::new(), classifier, |file| {
        if let Some(ref pb) = pb {
            pb.inc(1);
            pb.set_message(file_name(file));
        }
    });
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    outcome
}

fn progress_bar(args: &Args, len: usize) -> Option<ProgressBar> {
    if args.quiet || len <= 1 {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    Some(pb)
}

fn run_scan(
    args: &Args,
    rules: RuleTable,
    path: &Path,
    report: ReportOptions,
    recursive: bool,
) -> i32 {
    let classifier = Classifier::new(rules);
    let outcome = scan_with_progress(args, &classifier, path, recursive);
    let summary = outcome.summary();

    if !args.quiet {
        for result in &outcome.results {
            print_result(result, path);
        }
        for error in &outcome.errors {
            println!(
                "\x1b[90m{:<8}\x1b[0m {}  {}",
                "[ERROR]",
                display_path(&error.path, path),
                error.reason
            );
        }
    }

    print_summary(&summary);

    let report_path = if let Some(ref output) = report.output {
        Some(output.clone())
    } else if !report.no_report {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        Some(report.report_dir.join(format!("cdjcheck_report_{}.txt", timestamp)))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = cdjcheck::report::generate(output_path, &outcome, path) {
            fail(&format!("Failed to write report: {}", e));
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }
        if report.open {
            if let Err(e) = open::that(output_path) {
                eprintln!("Failed to open report: {}", e);
            }
        }
    }

    if summary.incompatible > 0 || summary.errors > 0 {
        2
    } else {
        0
    }
}

fn print_result(result: &ClassificationResult, root: &Path) {
    let record = &result.record;
    let (color, label) = if result.compatible {
        ("\x1b[32m", "[OK]")
    } else {
        ("\x1b[31m", "[FIX]")
    };

    println!(
        "{}{:<8}\x1b[0m {:<5} {:>6}Hz  {:>8}  {}ch  {}",
        color,
        label,
        record.family.to_string(),
        record.sample_rate_hz,
        record.encoding.to_string(),
        record.channels,
        display_path(&record.path, root)
    );
    for violation in &result.violations {
        println!("\x1b[90m         - {}\x1b[0m", violation);
    }
}

fn print_summary(summary: &Summary) {
    eprintln!("\n{}", "─".repeat(70));
    eprintln!("\x1b[1mSummary:\x1b[0m");
    eprintln!("  \x1b[32m✓ Compatible:\x1b[0m   {}", summary.compatible);
    eprintln!("  \x1b[31m✗ Incompatible:\x1b[0m {}", summary.incompatible);
    eprintln!(
        "  Rate:           {:.1}%",
        summary.compatibility_rate() * 100.0
    );
    if summary.errors > 0 {
        eprintln!("  \x1b[90mErrors:\x1b[0m         {}", summary.errors);
    }
}

fn run_convert(
    args: &Args,
    rules: RuleTable,
    path: &Path,
    out: &Path,
    converter: &Converter,
    dry_run: bool,
    recursive: bool,
) -> i32 {
    let layout = match OutputLayout::new(path, out) {
        Ok(layout) => layout,
        Err(e) => fail(&e.reason),
    };

    let classifier = Classifier::new(rules);
    let outcome = scan_with_progress(args, &classifier, path, recursive);

    let planner = Planner::new(classifier.rules());
    let plans: Vec<RemediationPlan> = outcome
        .incompatible()
        .filter_map(|result| planner.plan(result))
        .collect();

    if plans.is_empty() {
        eprintln!("No incompatible files found. All files are CDJ-compatible.");
        return 0;
    }
    eprintln!("Found {} incompatible file(s) to convert.", plans.len());

    let outputs = layout.assign(&plans);
    let base = layout.root();

    if dry_run {
        for (plan, output) in plans.iter().zip(&outputs) {
            match output {
                Ok(output) => println!(
                    "{}  ->  {}  ({})",
                    display_path(&plan.source, base),
                    output.display(),
                    plan.target
                ),
                Err(e) => println!(
                    "{}  ->  \x1b[31m{}\x1b[0m",
                    display_path(&plan.source, base),
                    e.reason
                ),
            }
        }
        return 0;
    }

    if let Err(e) = converter.check_available() {
        fail(&e.reason);
    }

    let pb = progress_bar(args, plans.len());
    let converted: Vec<(&RemediationPlan, Result<PathBuf, ConversionError>)> = plans
        .par_iter()
        .zip(outputs.into_par_iter())
        .map(|(plan, output)| {
            let result = output.and_then(|output| converter.convert(plan, &output));
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(file_name(&plan.source));
            }
            (plan, result)
        })
        .collect();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut failed = 0;
    for (plan, result) in &converted {
        match result {
            Ok(output) => {
                if !args.quiet {
                    println!(
                        "\x1b[32m{:<8}\x1b[0m {} -> {} ({})",
                        "[DONE]",
                        display_path(&plan.source, base),
                        output.display(),
                        plan.target
                    );
                }
            }
            Err(e) => {
                failed += 1;
                println!(
                    "\x1b[31m{:<8}\x1b[0m {}  {}",
                    "[FAILED]",
                    display_path(&plan.source, base),
                    e.reason
                );
            }
        }
    }

    eprintln!("\n{}", "─".repeat(70));
    eprintln!(
        "Converted {} of {} file(s) into {}",
        converted.len() - failed,
        converted.len(),
        out.display()
    );

    if failed > 0 {
        2
    } else {
        0
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
