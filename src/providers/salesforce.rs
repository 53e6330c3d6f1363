// ABOUTME: Salesforce CRM adapter: opportunities queried via SOQL on the tenant instance
// ABOUTME: Amounts are major units; the instance URL comes from the credential's scopes field
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::SALESFORCE;
use crate::errors::{AppError, AppResult};
use crate::models::{Invoice, ProviderSummary, Transaction, TransactionKind};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, normalize, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const SOQL: &str = "SELECT Id, Name, Amount, StageName, CloseDate FROM Opportunity \
                    ORDER BY CloseDate DESC LIMIT 100";

#[derive(Debug, Deserialize)]
struct SoqlResponse {
    #[serde(default)]
    records: Vec<Opportunity>,
}

/// Native opportunity shape; `Amount` is already in major units
#[derive(Debug, Deserialize)]
struct Opportunity {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<f64>,
    #[serde(rename = "StageName", default)]
    stage_name: Option<String>,
    #[serde(rename = "CloseDate", default)]
    close_date: Option<String>,
}

/// CRM adapter for Salesforce.
///
/// The per-tenant instance URL is captured during authorization (token
/// response `instance_url`) and stored in the credential's auxiliary field;
/// it is not re-derivable from the token alone.
pub struct SalesforceAdapter;

impl SalesforceAdapter {
    fn map_records(
        records: &[Opportunity],
        today: NaiveDate,
    ) -> (Vec<Invoice>, Vec<Transaction>) {
        let mut invoices = Vec::new();
        let mut transactions = Vec::new();

        for record in records {
            let name = record
                .name
                .clone()
                .unwrap_or_else(|| format!("Opportunity {}", record.id));
            let amount = record.amount.unwrap_or(0.0);
            let close_date = normalize::parse_date(record.close_date.as_deref());

            match record.stage_name.as_deref() {
                Some("Closed Won") => transactions.push(Transaction {
                    id: record.id.clone(),
                    date: close_date,
                    description: name,
                    amount,
                    kind: TransactionKind::Income,
                }),
                Some("Closed Lost") => {}
                _ => invoices.push(Invoice {
                    id: record.id.clone(),
                    number: record.id.clone(),
                    customer_name: name,
                    amount,
                    currency: "USD".to_owned(),
                    status: normalize::open_invoice_status(close_date, today),
                    due_date: close_date,
                    created_date: None,
                }),
            }
        }

        (invoices, transactions)
    }
}

#[async_trait]
impl ProviderAdapter for SalesforceAdapter {
    fn name(&self) -> &'static str {
        SALESFORCE
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(SALESFORCE).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        let instance_url = ctx
            .scoped_id
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::ReconnectRequired(SALESFORCE.to_owned()))?;

        let url = format!(
            "{}/services/data/v59.0/query",
            instance_url.trim_end_matches('/')
        );
        let response = ctx
            .http
            .get(&url)
            .bearer_auth(ctx.access_token)
            .query(&[("q", SOQL)])
            .send()
            .await
            .map_err(|e| transport_error(SALESFORCE, &e))?;

        check_status(SALESFORCE, &response)?;
        let body: SoqlResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SALESFORCE, &e))?;

        let (invoices, transactions) = Self::map_records(&body.records, ctx.today);
        let metrics = normalize::derive_metrics(&invoices, 0.0, ctx.today);

        Ok(ProviderSummary {
            provider: SALESFORCE.to_owned(),
            connected_account: ctx.connected_account.to_owned(),
            last_synced_at: ctx.last_synced_at,
            cash_flow: None,
            invoices,
            transactions,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceStatus;

    #[test]
    fn stages_map_into_shared_vocabulary() {
        let body: SoqlResponse = serde_json::from_str(
            r#"{
                "records": [
                    {"Id": "006A", "Name": "Acme Q3", "Amount": 12000.0, "StageName": "Negotiation", "CloseDate": "2025-07-01"},
                    {"Id": "006B", "Name": "Globex", "Amount": 4000.0, "StageName": "Closed Won", "CloseDate": "2025-05-01"},
                    {"Id": "006C", "Name": "Dead deal", "Amount": 1.0, "StageName": "Closed Lost"}
                ]
            }"#,
        )
        .expect("parse");

        let today = NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date");
        let (invoices, transactions) = SalesforceAdapter::map_records(&body.records, today);

        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].status, InvoiceStatus::Unpaid);
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Income);
    }
}
