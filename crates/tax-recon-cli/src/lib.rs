mod config;
mod show;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args as ClapArgs, CommandFactory as _, Parser, Subcommand};
use tax_recon::TargetMonth;
use tax_recon_pdf::{MEMBERSHIP_PREFIX, MEMBERSHIP_TAX_PREFIX, RECONCILIATION_PREFIX, ReportInfo};

use crate::config::{Config, Overrides, Settings};
use crate::show::Palette;

#[derive(Parser)]
#[command(
    name = "tax-recon",
    about = "Reconcile a transaction export against a tax report for one month"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Config file. Defaults to tax-recon.toml or .tax-recon.toml in the working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    files: FileArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ClapArgs)]
struct FileArgs {
    /// Transaction report (.xlsx, .xls, .ods or .csv)
    #[arg(short, long)]
    transactions: Option<PathBuf>,

    /// Tax report (.xlsx, .xls, .ods or .csv)
    #[arg(short = 'x', long)]
    tax: Option<PathBuf>,

    /// Month to reconcile, as YYYY-MM
    #[arg(short, long)]
    month: Option<TargetMonth>,

    /// Module to reconcile, e.g. pos
    #[arg(long)]
    module: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the reconciliation summary (default)
    Diff,
    /// Write the reconciliation report as PDF
    Pdf {
        /// Directory the report is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Summarize membership sales by type and tax report match
    Membership {
        /// Membership export with subscription start dates
        #[arg(long)]
        memberships: Option<PathBuf>,

        /// Also write the membership report as PDF
        #[arg(long)]
        pdf: bool,

        /// Directory the report is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Summarize membership tax by type from the membership export alone
    MembershipTax {
        /// Membership export with type, total, tax and update dates
        #[arg(long)]
        memberships: Option<PathBuf>,

        /// Also write the summary as PDF
        #[arg(long)]
        pdf: bool,

        /// Directory the report is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

pub fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tax_recon=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let config = match &args.config {
        Some(path) => Some(Config::load_from_file(path)?),
        None => Config::find_and_load()?,
    };

    let command = args.command.unwrap_or(Commands::Diff);
    let mut overrides = Overrides {
        transactions: args.files.transactions,
        tax: args.files.tax,
        month: args.files.month,
        module: args.files.module,
        ..Overrides::default()
    };
    match &command {
        Commands::Diff => {}
        Commands::Pdf { output_dir } => overrides.output_dir = output_dir.clone(),
        Commands::Membership {
            memberships,
            output_dir,
            ..
        }
        | Commands::MembershipTax {
            memberships,
            output_dir,
            ..
        } => {
            overrides.memberships = memberships.clone();
            overrides.output_dir = output_dir.clone();
        }
    }
    let settings = Settings::resolve(config, overrides)?;

    match command {
        Commands::Diff => diff(&settings),
        Commands::Pdf { .. } => pdf(&settings),
        Commands::Membership { pdf, .. } => membership(&settings, pdf),
        Commands::MembershipTax { pdf, .. } => membership_tax(&settings, pdf),
    }
}

fn diff(settings: &Settings) -> Result<()> {
    let state = settings.reconcile_config()?.read()?;
    let result = state.reconcile();
    print!("{}", show::render_diff(&state, &result, &Palette::for_stdout())?);
    Ok(())
}

fn pdf(settings: &Settings) -> Result<()> {
    let state = settings.reconcile_config()?.read()?;
    let result = state.reconcile();

    let now = chrono::Local::now().naive_local();
    let info = ReportInfo::new(settings.title.clone(), now);
    let document = tax_recon_pdf::reconciliation_document(&state, &result, &info);
    let path = tax_recon_pdf::pdf::write(&document, &settings.output_dir, RECONCILIATION_PREFIX, now)?;

    println!("✓ Report written to {}", path.display());
    Ok(())
}

fn membership(settings: &Settings, write_pdf: bool) -> Result<()> {
    let report = settings.membership_config()?.read()?;
    print!("{}", show::render_membership(&report, &Palette::for_stdout())?);

    if write_pdf {
        let now = chrono::Local::now().naive_local();
        let info = ReportInfo::new(settings.membership_title.clone(), now);
        let document = tax_recon_pdf::membership_document(&report, &info);
        let path =
            tax_recon_pdf::pdf::write(&document, &settings.output_dir, MEMBERSHIP_PREFIX, now)?;
        println!("✓ Report written to {}", path.display());
    }
    Ok(())
}

fn membership_tax(settings: &Settings, write_pdf: bool) -> Result<()> {
    let report = settings.membership_tax_config()?.read()?;
    print!("{}", show::render_membership_tax(&report, &Palette::for_stdout())?);

    if write_pdf {
        let now = chrono::Local::now().naive_local();
        let info = ReportInfo::new(settings.membership_title.clone(), now);
        let document = tax_recon_pdf::membership_tax_document(&report, &info);
        let path =
            tax_recon_pdf::pdf::write(&document, &settings.output_dir, MEMBERSHIP_TAX_PREFIX, now)?;
        println!("✓ Report written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let args = Args::try_parse_from([
            "tax-recon",
            "-t",
            "t.xlsx",
            "-x",
            "x.xlsx",
            "-m",
            "2025-08",
            "membership",
            "--memberships",
            "m.xlsx",
            "--pdf",
        ])
        .unwrap();
        assert_eq!(args.files.month.unwrap().to_string(), "2025-08");
        assert!(matches!(
            args.command,
            Some(Commands::Membership { pdf: true, .. })
        ));

        let args = Args::try_parse_from([
            "tax-recon",
            "-m",
            "2025-08",
            "membership-tax",
            "--memberships",
            "Membership.xlsx",
        ])
        .unwrap();
        assert!(args.files.transactions.is_none());
        assert!(matches!(
            args.command,
            Some(Commands::MembershipTax { pdf: false, .. })
        ));

        let args = Args::try_parse_from(["tax-recon"]).unwrap();
        assert!(args.command.is_none());

        assert!(Args::try_parse_from(["tax-recon", "-m", "August"]).is_err());
    }
}
