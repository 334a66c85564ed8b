use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use clo_attainment::ingest::{self, IngestConfig};
use clo_attainment::models::{AnalysisRequest, AnalysisResult};
use clo_attainment::{engine, report};

#[derive(Parser)]
#[command(name = "clo-attainment", version)]
#[command(about = "Course learning outcome attainment from per-question exam scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SheetArgs {
    /// Score sheet (CSV) covering one or more course offerings
    #[arg(long)]
    scores: PathBuf,
    #[arg(long, env = "CLO_COURSE_COLUMN", default_value = "course")]
    course_column: String,
    #[arg(long, env = "CLO_ID_COLUMN", default_value = "student_id")]
    id_column: String,
    /// Extra non-score columns to skip
    #[arg(long, value_delimiter = ',', default_value = "name,class,total,exam_code")]
    ignore: Vec<String>,
}

impl SheetArgs {
    fn config(&self) -> IngestConfig {
        IngestConfig {
            course_column: self.course_column.clone(),
            id_column: self.id_column.clone(),
            ignore_columns: self.ignore.clone(),
        }
    }
}

#[derive(Args)]
struct AnalysisArgs {
    #[command(flatten)]
    sheet: SheetArgs,
    #[arg(long)]
    course: String,
    /// Outcome declaration (TOML)
    #[arg(long)]
    declaration: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List course offerings in a score sheet
    Courses {
        #[command(flatten)]
        sheet: SheetArgs,
    },
    /// List question columns eligible to back an outcome
    Questions {
        #[command(flatten)]
        sheet: SheetArgs,
        #[arg(long)]
        course: String,
    },
    /// Compute attainment and band distribution for each outcome
    Analyze {
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Also write attainment.csv and bands.csv here
        #[arg(long)]
        csv_dir: Option<PathBuf>,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long)]
        recommendations: Option<String>,
    },
}

fn run_analysis(args: &AnalysisArgs) -> anyhow::Result<(AnalysisRequest, AnalysisResult)> {
    let sheet = ingest::read_sheet(&args.sheet.scores)?;
    let table = sheet.offering(&args.course, &args.sheet.config())?;
    let declaration = ingest::load_declaration(&args.declaration)?;
    let request = declaration.into_request(table);
    let result = engine::analyze(&request)
        .with_context(|| format!("invalid outcome declaration for {}", args.course))?;
    Ok((request, result))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("clo_attainment=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Courses { sheet } => {
            let courses = ingest::read_sheet(&sheet.scores)?.courses(&sheet.config())?;
            if courses.is_empty() {
                println!("No course offerings found.");
                return Ok(());
            }
            for course in courses {
                println!("- {course}");
            }
        }
        Commands::Questions { sheet, course } => {
            let table = ingest::read_sheet(&sheet.scores)?.offering(&course, &sheet.config())?;
            let eligible = table.eligible_questions();
            if eligible.is_empty() {
                println!("No question columns with scores for {course}.");
                return Ok(());
            }
            println!("Questions with scores for {course} ({} students):", table.student_count());
            for question in eligible {
                println!("{question} = {:.1}", ingest::DEFAULT_QUESTION_MAX);
            }
        }
        Commands::Analyze { analysis, format } => {
            let (_, result) = run_analysis(&analysis)?;
            match format {
                OutputFormat::Text => print!("{}", report::render_summary(&result)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }
        Commands::Report {
            analysis,
            out,
            csv_dir,
            comments,
            recommendations,
        } => {
            let (request, result) = run_analysis(&analysis)?;
            let notes = report::ReportNotes {
                comments,
                recommendations,
            };
            let markdown = report::build_report(&request, &result, Utc::now().date_naive(), &notes);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(dir) = csv_dir {
                report::export_csv(&dir, &result)?;
                println!("Tables exported to {}.", dir.display());
            }
        }
    }

    Ok(())
}
