use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tax_recon::membership::{MembershipColumns, MembershipConfig};
use tax_recon::membership_tax::MembershipTaxConfig;
use tax_recon::reconcile::ReconcileConfig;
use tax_recon::records::{TaxColumns, TransactionColumns};
use tax_recon::{Category, TargetMonth};

pub const DEFAULT_MODULE: &str = "pos";
pub const DEFAULT_TITLE: &str = "Transaction vs Tax Report";
pub const DEFAULT_MEMBERSHIP_TITLE: &str = "Membership Report";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigTransactions {
    pub file: PathBuf,
    pub fallback_date_column: Option<String>,
    #[serde(default)]
    pub columns: TransactionColumns,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigTax {
    pub file: PathBuf,
    #[serde(default)]
    pub columns: TaxColumns,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigMemberships {
    pub file: PathBuf,
    /// Title of the membership PDFs.
    pub title: Option<String>,
    #[serde(default)]
    pub columns: MembershipColumns,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub month: Option<TargetMonth>,
    pub module: Option<String>,
    pub tax_module: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub title: Option<String>,
    pub transactions: Option<ConfigTransactions>,
    pub tax: Option<ConfigTax>,
    pub memberships: Option<ConfigMemberships>,
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<(PathBuf, Self)> {
        let base_dir = path.parent().map(ToOwned::to_owned).unwrap_or_default();

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");

        Ok((base_dir, config))
    }

    pub fn find_and_load() -> Result<Option<(PathBuf, Self)>> {
        let config_locations = [Path::new("tax-recon.toml"), Path::new(".tax-recon.toml")];

        for location in &config_locations {
            if location.exists() {
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }
}

/// Values given on the command line. They win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub transactions: Option<PathBuf>,
    pub tax: Option<PathBuf>,
    pub memberships: Option<PathBuf>,
    pub month: Option<TargetMonth>,
    pub module: Option<String>,
    pub output_dir: Option<PathBuf>,
}

/// Config file and command line merged into everything a run needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transactions: Option<PathBuf>,
    pub tax: Option<PathBuf>,
    pub memberships: Option<PathBuf>,
    pub month: TargetMonth,
    pub category: Category,
    pub output_dir: PathBuf,
    pub title: String,
    pub membership_title: String,
    pub fallback_date_column: Option<String>,
    pub transaction_columns: TransactionColumns,
    pub tax_columns: TaxColumns,
    pub membership_columns: MembershipColumns,
}

impl Settings {
    /// Paths from the config file are relative to the file's directory,
    /// paths from the command line to the working directory. Input files are
    /// checked by the command that needs them.
    pub fn resolve(config: Option<(PathBuf, Config)>, overrides: Overrides) -> Result<Self> {
        let (base_dir, config) = config.unwrap_or_default();
        let from_config = |path: &Path| base_dir.join(path);

        let transactions = overrides
            .transactions
            .or_else(|| config.transactions.as_ref().map(|t| from_config(&t.file)));
        let tax = overrides
            .tax
            .or_else(|| config.tax.as_ref().map(|t| from_config(&t.file)));
        let memberships = overrides
            .memberships
            .or_else(|| config.memberships.as_ref().map(|m| from_config(&m.file)));
        let month = overrides
            .month
            .or(config.month)
            .context("No month given. Pass --month YYYY-MM or set month in tax-recon.toml")?;
        let output_dir = overrides
            .output_dir
            .or_else(|| config.output_dir.as_deref().map(from_config))
            .unwrap_or_else(|| base_dir.clone());

        let module = overrides
            .module
            .or(config.module)
            .unwrap_or_else(|| DEFAULT_MODULE.to_owned());
        let category = Category {
            tax_module: Some(config.tax_module.unwrap_or_else(|| module.clone())),
            module,
        };

        let (fallback_date_column, transaction_columns) = match config.transactions {
            Some(transactions) => (transactions.fallback_date_column, transactions.columns),
            None => (None, TransactionColumns::default()),
        };

        let (membership_title, membership_columns) = match config.memberships {
            Some(memberships) => (memberships.title, memberships.columns),
            None => (None, MembershipColumns::default()),
        };

        Ok(Settings {
            transactions,
            tax,
            memberships,
            month,
            category,
            output_dir,
            title: config.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            membership_title: membership_title
                .unwrap_or_else(|| DEFAULT_MEMBERSHIP_TITLE.to_owned()),
            fallback_date_column,
            transaction_columns,
            tax_columns: config.tax.map(|tax| tax.columns).unwrap_or_default(),
            membership_columns,
        })
    }

    fn transactions(&self) -> Result<&Path> {
        self.transactions.as_deref().context(
            "No transaction report given. Pass --transactions or set [transactions] file in tax-recon.toml",
        )
    }

    fn tax(&self) -> Result<&Path> {
        self.tax
            .as_deref()
            .context("No tax report given. Pass --tax or set [tax] file in tax-recon.toml")
    }

    fn memberships(&self) -> Result<&Path> {
        self.memberships.as_deref().context(
            "No membership export given. Pass --memberships or set [memberships] file in tax-recon.toml",
        )
    }

    pub fn reconcile_config(&self) -> Result<ReconcileConfig> {
        Ok(ReconcileConfig {
            transaction_columns: self.transaction_columns.clone(),
            tax_columns: self.tax_columns.clone(),
            fallback_date_column: self.fallback_date_column.clone(),
            ..ReconcileConfig::new(
                self.transactions()?,
                self.tax()?,
                self.month,
                self.category.clone(),
            )
        })
    }

    pub fn membership_config(&self) -> Result<MembershipConfig> {
        Ok(MembershipConfig {
            transaction_columns: self.transaction_columns.clone(),
            tax_columns: self.tax_columns.clone(),
            membership_columns: self.membership_columns.clone(),
            ..MembershipConfig::new(
                self.transactions()?,
                self.tax()?,
                self.memberships()?,
                self.month,
            )
        })
    }

    /// Only the membership export is needed here.
    pub fn membership_tax_config(&self) -> Result<MembershipTaxConfig> {
        Ok(MembershipTaxConfig {
            columns: self.membership_columns.clone(),
            ..MembershipTaxConfig::new(self.memberships()?, self.month)
        })
    }
}
