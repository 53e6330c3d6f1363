// ABOUTME: Pipedrive CRM adapter: deals fetched from the v1 REST API
// ABOUTME: Deal values are major units; the open/won/lost status field drives mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::PIPEDRIVE;
use crate::errors::AppResult;
use crate::models::{Invoice, ProviderSummary, Transaction, TransactionKind};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, normalize, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const DEALS_URL: &str = "https://api.pipedrive.com/v1/deals";

#[derive(Debug, Deserialize)]
struct PipedriveDealList {
    #[serde(default)]
    data: Option<Vec<PipedriveDeal>>,
}

/// Native deal shape; `value` is already in major units
#[derive(Debug, Deserialize)]
struct PipedriveDeal {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    /// "open", "won", "lost", or "deleted"
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    expected_close_date: Option<String>,
    #[serde(default)]
    won_time: Option<String>,
}

/// CRM adapter for Pipedrive
pub struct PipedriveAdapter;

impl PipedriveAdapter {
    fn map_deals(deals: &[PipedriveDeal], today: NaiveDate) -> (Vec<Invoice>, Vec<Transaction>) {
        let mut invoices = Vec::new();
        let mut transactions = Vec::new();

        for deal in deals {
            let id = deal.id.to_string();
            let name = deal.title.clone().unwrap_or_else(|| format!("Deal {id}"));
            let amount = deal.value.unwrap_or(0.0);
            let currency = deal
                .currency
                .clone()
                .unwrap_or_else(|| "USD".to_owned());

            match deal.status.as_deref() {
                Some("won") => {
                    // won_time is a datetime; only the date part matters
                    let date = deal
                        .won_time
                        .as_deref()
                        .map(|raw| raw.get(..10).unwrap_or(raw))
                        .and_then(|d| normalize::parse_date(Some(d)));
                    transactions.push(Transaction {
                        id,
                        date,
                        description: name,
                        amount,
                        kind: TransactionKind::Income,
                    });
                }
                Some("open") | None => {
                    let due_date = normalize::parse_date(deal.expected_close_date.as_deref());
                    invoices.push(Invoice {
                        id: id.clone(),
                        number: id,
                        customer_name: name,
                        amount,
                        currency,
                        status: normalize::open_invoice_status(due_date, today),
                        due_date,
                        created_date: None,
                    });
                }
                // "lost" and "deleted" drop out of the summary
                Some(_) => {}
            }
        }

        (invoices, transactions)
    }
}

#[async_trait]
impl ProviderAdapter for PipedriveAdapter {
    fn name(&self) -> &'static str {
        PIPEDRIVE
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(PIPEDRIVE).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        let response = ctx
            .http
            .get(DEALS_URL)
            .bearer_auth(ctx.access_token)
            .query(&[("limit", "100")])
            .send()
            .await
            .map_err(|e| transport_error(PIPEDRIVE, &e))?;

        check_status(PIPEDRIVE, &response)?;
        let list: PipedriveDealList = response
            .json()
            .await
            .map_err(|e| transport_error(PIPEDRIVE, &e))?;

        let deals = list.data.unwrap_or_default();
        let (invoices, transactions) = Self::map_deals(&deals, ctx.today);
        let metrics = normalize::derive_metrics(&invoices, 0.0, ctx.today);

        Ok(ProviderSummary {
            provider: PIPEDRIVE.to_owned(),
            connected_account: ctx.connected_account.to_owned(),
            last_synced_at: ctx.last_synced_at,
            cash_flow: None,
            invoices,
            transactions,
            metrics,
        })
    }
}
