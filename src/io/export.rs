use std::io::Write;

use anyhow::Result;

use crate::application::LedgerService;
use crate::domain::format_cents;

/// Exporter for turning ledger data into CSV.
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export one account's statement (most recent first) as CSV.
    /// Returns the number of records written.
    pub async fn export_statement_csv<W: Write>(
        &self,
        account_id: &str,
        writer: W,
    ) -> Result<usize> {
        let records = self.service.history(account_id, None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "kind", "amount", "signed_cents", "timestamp"])?;

        let mut count = 0;
        for record in &records {
            csv_writer.write_record(&[
                record.id.to_string(),
                record.kind.to_string(),
                format_cents(record.amount_cents),
                record.signed_amount().to_string(),
                record.timestamp.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export every account's current balance as CSV.
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts(true).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account", "full_name", "balance", "closed"])?;

        let mut count = 0;
        for account in &accounts {
            csv_writer.write_record(&[
                account.id.clone(),
                account.full_name.clone(),
                format_cents(account.balance_cents),
                account.is_closed().to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }
}
