use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::auth;
use crate::domain::{format_cents, parse_cents};
use crate::io::Exporter;

/// Sportello - account ledger for a small bank
#[derive(Parser)]
#[command(name = "sportello")]
#[command(about = "An account ledger with an append-only transaction history")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "sportello.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Register a new customer account
    Register {
        /// Account user id (must be unique)
        id: String,

        /// Account password (hashed before it reaches the ledger)
        #[arg(long)]
        password: String,

        /// Full name of the account holder
        #[arg(long)]
        full_name: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        date_of_birth: String,
    },

    /// Create an admin credential
    AdminAdd {
        /// Admin user id
        id: String,

        /// Admin password
        #[arg(long)]
        password: String,
    },

    /// Verify a credential (customer by default, admin with --admin)
    Login {
        /// User id
        id: String,

        /// Password to verify
        #[arg(long)]
        password: String,

        /// Check against admin credentials instead of customer ones
        #[arg(long)]
        admin: bool,
    },

    /// Deposit money into an account
    Deposit {
        /// Account user id
        id: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account user id
        id: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Transfer money between two accounts
    Transfer {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Source account user id
        #[arg(long)]
        from: String,

        /// Destination account user id
        #[arg(long)]
        to: String,
    },

    /// Show an account's balance
    Balance {
        /// Account user id
        id: String,
    },

    /// Show an account's transaction history, most recent first
    History {
        /// Account user id
        id: String,

        /// Maximum number of records to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset an account's password
    ResetPassword {
        /// Account user id
        id: String,

        /// New password
        #[arg(long)]
        password: String,
    },

    /// Close an account (history stays readable)
    Close {
        /// Account user id
        id: String,
    },

    /// Verify ledger integrity
    Check,

    /// Export ledger data as CSV to stdout
    #[command(subcommand)]
    Export(ExportCommands),
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// One account's statement
    Statement {
        /// Account user id
        id: String,
    },

    /// Every account's current balance
    Balances,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Register {
                id,
                password,
                full_name,
                date_of_birth,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let dob = parse_date(&date_of_birth)?;
                let hash = auth::hash_password(&password)?;
                let account = service.register(&id, &hash, &full_name, dob).await?;
                println!("Registered account: {} ({})", account.id, account.full_name);
            }

            Commands::AdminAdd { id, password } => {
                let service = LedgerService::connect(&self.database).await?;
                let hash = auth::hash_password(&password)?;
                let admin = service.create_admin(&id, &hash).await?;
                println!("Created admin: {}", admin.id);
            }

            Commands::Login {
                id,
                password,
                admin,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let ok = if admin {
                    service.verify_admin(&id, &password).await?
                } else {
                    service.verify_credential(&id, &password).await?
                };
                if !ok {
                    bail!("Credentials rejected for {}", id);
                }
                println!("Credentials accepted for {}", id);
            }

            Commands::Deposit { id, amount } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents = parse_amount(&amount)?;
                let record = service.deposit(&id, amount_cents).await?;
                println!(
                    "Deposited {} into {} (record #{})",
                    format_cents(record.amount_cents),
                    id,
                    record.id
                );
            }

            Commands::Withdraw { id, amount } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents = parse_amount(&amount)?;
                let record = service.withdraw(&id, amount_cents).await?;
                println!(
                    "Withdrew {} from {} (record #{})",
                    format_cents(record.amount_cents),
                    id,
                    record.id
                );
            }

            Commands::Transfer { amount, from, to } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents = parse_amount(&amount)?;
                let receipt = service.transfer(&from, &to, amount_cents).await?;
                println!(
                    "Transferred {} from {} to {} (records #{} / #{})",
                    format_cents(amount_cents),
                    from,
                    to,
                    receipt.outgoing.id,
                    receipt.incoming.id
                );
            }

            Commands::Balance { id } => {
                let service = LedgerService::connect(&self.database).await?;
                let balance = service.check_balance(&id).await?;
                println!("{}: {}", id, format_cents(balance));
            }

            Commands::History { id, limit, json } => {
                let service = LedgerService::connect(&self.database).await?;
                let records = service.history(&id, limit).await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                } else if records.is_empty() {
                    println!("No transactions for {}", id);
                } else {
                    for record in &records {
                        println!(
                            "#{} {} {} {}",
                            record.id,
                            record.timestamp.to_rfc3339(),
                            record.kind,
                            format_cents(record.amount_cents)
                        );
                    }
                }
            }

            Commands::ResetPassword { id, password } => {
                let service = LedgerService::connect(&self.database).await?;
                let hash = auth::hash_password(&password)?;
                service.reset_password(&id, &hash).await?;
                println!("Password reset for {}", id);
            }

            Commands::Close { id } => {
                let service = LedgerService::connect(&self.database).await?;
                service.close_account(&id).await?;
                println!("Closed account: {}", id);
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                let report = service.check_integrity().await?;

                println!(
                    "{} accounts, {} transactions",
                    report.account_count, report.transaction_count
                );
                if report.is_clean() {
                    println!("Ledger is consistent.");
                } else {
                    if report.has_sequence_gaps {
                        println!("FAIL: gaps in the transaction id sequence");
                    }
                    if report.invalid_amounts > 0 {
                        println!("FAIL: {} records with invalid amounts", report.invalid_amounts);
                    }
                    if report.orphaned_records > 0 {
                        println!(
                            "FAIL: {} records referencing unknown accounts",
                            report.orphaned_records
                        );
                    }
                    for m in &report.mismatches {
                        println!(
                            "FAIL: {} stored {} but log replays to {}",
                            m.account_id,
                            format_cents(m.stored_cents),
                            format_cents(m.computed_cents)
                        );
                    }
                    bail!("Ledger integrity check failed");
                }
            }

            Commands::Export(export_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                let exporter = Exporter::new(&service);
                let stdout = std::io::stdout().lock();
                match export_cmd {
                    ExportCommands::Statement { id } => {
                        exporter.export_statement_csv(&id, stdout).await?;
                    }
                    ExportCommands::Balances => {
                        exporter.export_balances_csv(stdout).await?;
                    }
                }
            }
        }

        Ok(())
    }
}

fn parse_amount(input: &str) -> Result<i64> {
    parse_cents(input).context("Invalid amount format. Use '50.00' or '50'")
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", input))
}
