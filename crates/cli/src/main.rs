use anyhow::Context;
use clap::{Parser, Subcommand};
use egfr_core::config::recent_limit_from_env_value;
use egfr_core::dashboard::{dashboard_for, Dashboard};
use egfr_core::measurement::MeasurementInput;
use egfr_core::report::{mailto_link, render_text_report, report_filename, stage_legend, RiskBand};
use egfr_core::requests::{AdultRequest, CalculationRequest, Evaluation, PediatricRequest};
use egfr_core::{
    batch, constants, engine, ingest, AccountService, CkdStage, CoreConfig, CreatinineUnit,
    EgfrEstimate, Ethnicity, Gender, Role,
};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "egfr")]
#[command(about = "eGFR calculator and CKD staging CLI")]
struct Cli {
    /// Data directory (defaults to EGFR_DATA_DIR, then egfr_data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Adult eGFR (MDRD); refuses patients under 18
    Adult {
        #[arg(long)]
        age: f64,
        #[arg(long)]
        creatinine: f64,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        ethnicity: Option<Ethnicity>,
        /// umol/L (default) or mg/dL
        #[arg(long, default_value = "umol/L")]
        unit: CreatinineUnit,
    },
    /// Pediatric eGFR (bedside Schwartz)
    Pediatric {
        /// Height in cm
        #[arg(long)]
        height: f64,
        #[arg(long)]
        creatinine: f64,
        /// umol/L (default) or mg/dL
        #[arg(long, default_value = "umol/L")]
        unit: CreatinineUnit,
    },
    /// eGFR with the formula chosen from the age
    Calc {
        #[arg(long)]
        age: f64,
        #[arg(long)]
        creatinine: f64,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        ethnicity: Option<Ethnicity>,
        /// Height in cm, required under 18
        #[arg(long)]
        height: Option<f64>,
        /// umol/L (default) or mg/dL
        #[arg(long, default_value = "umol/L")]
        unit: CreatinineUnit,
        /// Save the result to this account
        #[arg(long)]
        user: Option<String>,
    },
    /// CKD stage of an eGFR value; with no value, list all stages
    Stage { value: Option<f64> },
    /// Calculate every row of a CSV file
    Batch {
        file: PathBuf,
        /// Save the results to this clinician account
        #[arg(long)]
        user: Option<String>,
    },
    /// Register an account
    Register {
        /// NHS number or HCP ID
        identifier: String,
        /// patient or clinician
        role: Role,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// List all accounts
    Users,
    /// Most recent results of an account
    Results {
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Dashboard of an account
    Dashboard { user: String },
    /// Plain-text report of a saved result
    Report {
        user: String,
        result_id: String,
        /// Write to a file instead of stdout; a directory gets the default file name
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print a mailto: link carrying the report instead of the report itself
        #[arg(long, conflicts_with = "output")]
        mailto: bool,
    },
}

fn core_config(data_dir: Option<PathBuf>) -> anyhow::Result<Arc<CoreConfig>> {
    let data_dir = data_dir
        .or_else(|| std::env::var("EGFR_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_DATA_DIR));
    let recent_limit = recent_limit_from_env_value(std::env::var("EGFR_RECENT_LIMIT").ok())?;
    Ok(Arc::new(CoreConfig::new(data_dir, recent_limit)?))
}

fn describe(estimate: &EgfrEstimate) -> String {
    let risk = RiskBand::for_value(estimate.value);
    let flag = if risk.is_flagged() {
        format!(" [{}]", risk.label().to_uppercase())
    } else {
        String::new()
    };
    format!(
        "eGFR: {} mL/min/1.73m² | {} ({}) | {} formula{}",
        estimate.value,
        estimate.stage,
        estimate.stage.description(),
        estimate.formula,
        flag
    )
}

fn print_evaluation(evaluation: &Evaluation) {
    println!("{}", describe(&evaluation.estimate));
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Adult {
            age,
            creatinine,
            gender,
            ethnicity,
            unit,
        }) => {
            let evaluation = AdultRequest {
                age: Some(age),
                gender,
                ethnicity,
                creatinine: Some(creatinine),
                creatinine_unit: unit,
            }
            .evaluate()?;
            print_evaluation(&evaluation);
        }
        Some(Commands::Pediatric {
            height,
            creatinine,
            unit,
        }) => {
            let evaluation = PediatricRequest {
                height_cm: Some(height),
                creatinine: Some(creatinine),
                creatinine_unit: unit,
            }
            .evaluate()?;
            print_evaluation(&evaluation);
        }
        Some(Commands::Calc {
            age,
            creatinine,
            gender,
            ethnicity,
            height,
            unit,
            user,
        }) => {
            let evaluation = CalculationRequest::Auto(MeasurementInput {
                age: Some(age),
                gender,
                ethnicity,
                creatinine: Some(creatinine),
                creatinine_unit: unit,
                height_cm: height,
            })
            .evaluate()?;
            print_evaluation(&evaluation);

            if let Some(user) = user {
                let account = AccountService::with_id(core_config(cli.data_dir)?, &user)?;
                let record = account.results().save(&evaluation, None)?;
                println!("Saved result {}", record.id);
            }
        }
        Some(Commands::Stage { value }) => match value {
            Some(value) => {
                let stage = engine::classify_ckd_stage(value);
                println!("{stage} ({})", stage.description());
            }
            None => {
                for stage in CkdStage::ALL {
                    println!("{}", stage_legend(stage));
                }
            }
        },
        Some(Commands::Batch { file, user }) => {
            let reader =
                File::open(&file).with_context(|| format!("failed to open {}", file.display()))?;

            let (outcome, saved) = match user {
                Some(user) => {
                    let account = AccountService::with_id(core_config(cli.data_dir)?, &user)?;
                    let ingestion = batch::ingest_and_save(&account, reader)?;
                    (ingestion.outcome, ingestion.saved.len())
                }
                None => (ingest::ingest_csv(reader)?, 0),
            };

            for entry in &outcome.entries {
                println!(
                    "line {:>4}  {:<12} {}",
                    entry.line,
                    entry.patient_id,
                    describe(&entry.estimate)
                );
            }
            for skipped in &outcome.skipped {
                println!("line {:>4}  skipped: {}", skipped.line, skipped.rejection);
            }
            println!(
                "{} calculated, {} skipped",
                outcome.entries.len(),
                outcome.skipped_count()
            );
            if saved > 0 {
                println!("Saved {saved} results");
            }
        }
        Some(Commands::Register {
            identifier,
            role,
            first_name,
            last_name,
        }) => {
            let service = AccountService::new(core_config(cli.data_dir)?).register(
                &identifier,
                role,
                first_name,
                last_name,
            )?;
            println!(
                "Registered {} {} with ID: {}",
                service.account().role,
                service.account().display_name(),
                service.account_id()
            );
        }
        Some(Commands::Users) => {
            let accounts = AccountService::new(core_config(cli.data_dir)?).list();
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                for account in accounts {
                    println!(
                        "ID: {}, Role: {}, Identifier: {}, Name: {}, Created: {}",
                        account.id,
                        account.role,
                        account.identifier,
                        account.display_name(),
                        account.created_at
                    );
                }
            }
        }
        Some(Commands::Results { user, limit }) => {
            let cfg = core_config(cli.data_dir)?;
            let limit = limit.unwrap_or_else(|| cfg.recent_limit());
            let account = AccountService::with_id(cfg, &user)?;
            let records = account.results().recent(limit)?;
            if records.is_empty() {
                println!("No results found.");
            }
            for record in records {
                println!(
                    "{}  {}  {}{}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    describe(&record.estimate()),
                    record
                        .patient_ref
                        .as_deref()
                        .map(|r| format!(" | patient {r}"))
                        .unwrap_or_default()
                );
            }
        }
        Some(Commands::Dashboard { user }) => {
            let account = AccountService::with_id(core_config(cli.data_dir)?, &user)?;
            match dashboard_for(&account)? {
                Dashboard::Patient { account, latest } => {
                    println!("Welcome, {}", account.display_name());
                    match latest {
                        Some(latest) => println!(
                            "Latest eGFR: {} mL/min/1.73m² ({}), calculated {}",
                            latest.value,
                            latest.stage,
                            latest.created_at.format("%Y-%m-%d %H:%M")
                        ),
                        None => println!("No results yet."),
                    }
                }
                Dashboard::Clinician { account, recent } => {
                    println!("Welcome, {}", account.display_name());
                    if recent.is_empty() {
                        println!("No recent patients.");
                    }
                    for row in recent {
                        println!(
                            "{:<10} {:<12} {}  eGFR {} ({})",
                            row.label,
                            row.patient_ref.as_deref().unwrap_or("-"),
                            row.last_calculated.format("%Y-%m-%d %H:%M"),
                            row.egfr,
                            row.stage
                        );
                    }
                }
            }
        }
        Some(Commands::Report {
            user,
            result_id,
            output,
            mailto,
        }) => {
            let account = AccountService::with_id(core_config(cli.data_dir)?, &user)?;
            let record = account.results().get(&result_id)?;
            if mailto {
                println!("{}", mailto_link(&record.estimate(), record.created_at));
                return Ok(());
            }
            let text = render_text_report(&record.estimate(), record.created_at);
            match output {
                Some(path) => {
                    let path = if path.is_dir() {
                        path.join(report_filename(record.created_at.date_naive()))
                    } else {
                        path
                    };
                    std::fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote report to {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        None => {
            println!("Use 'egfr --help' for commands");
        }
    }

    Ok(())
}
