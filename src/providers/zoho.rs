// ABOUTME: Zoho CRM adapter: deals fetched with the Zoho-oauthtoken auth scheme
// ABOUTME: Deal amounts are major units; stage strings map into the shared vocabulary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::ZOHO;
use crate::errors::AppResult;
use crate::models::{Invoice, ProviderSummary, Transaction, TransactionKind};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, normalize, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const DEALS_URL: &str = "https://www.zohoapis.com/crm/v2/Deals";

#[derive(Debug, Deserialize)]
struct ZohoDealList {
    #[serde(default)]
    data: Vec<ZohoDeal>,
}

/// Native deal shape; `Amount` is already in major units
#[derive(Debug, Deserialize)]
struct ZohoDeal {
    id: String,
    #[serde(rename = "Deal_Name", default)]
    deal_name: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<f64>,
    #[serde(rename = "Stage", default)]
    stage: Option<String>,
    #[serde(rename = "Closing_Date", default)]
    closing_date: Option<String>,
}

/// CRM adapter for Zoho
pub struct ZohoAdapter;

impl ZohoAdapter {
    fn map_deals(deals: &[ZohoDeal], today: NaiveDate) -> (Vec<Invoice>, Vec<Transaction>) {
        let mut invoices = Vec::new();
        let mut transactions = Vec::new();

        for deal in deals {
            let name = deal
                .deal_name
                .clone()
                .unwrap_or_else(|| format!("Deal {}", deal.id));
            let amount = deal.amount.unwrap_or(0.0);
            let closing_date = normalize::parse_date(deal.closing_date.as_deref());
            let stage = deal.stage.as_deref().unwrap_or_default();

            if stage.eq_ignore_ascii_case("closed won") {
                transactions.push(Transaction {
                    id: deal.id.clone(),
                    date: closing_date,
                    description: name,
                    amount,
                    kind: TransactionKind::Income,
                });
            } else if stage.eq_ignore_ascii_case("closed lost") {
                // Dropped from the summary
            } else {
                invoices.push(Invoice {
                    id: deal.id.clone(),
                    number: deal.id.clone(),
                    customer_name: name,
                    amount,
                    currency: "USD".to_owned(),
                    status: normalize::open_invoice_status(closing_date, today),
                    due_date: closing_date,
                    created_date: None,
                });
            }
        }

        (invoices, transactions)
    }
}

#[async_trait]
impl ProviderAdapter for ZohoAdapter {
    fn name(&self) -> &'static str {
        ZOHO
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(ZOHO).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        let response = ctx
            .http
            .get(DEALS_URL)
            // Zoho uses its own auth scheme instead of Bearer
            .header(
                "Authorization",
                format!("Zoho-oauthtoken {}", ctx.access_token),
            )
            .query(&[("per_page", "100")])
            .send()
            .await
            .map_err(|e| transport_error(ZOHO, &e))?;

        check_status(ZOHO, &response)?;
        let list: ZohoDealList = response
            .json()
            .await
            .map_err(|e| transport_error(ZOHO, &e))?;

        let (invoices, transactions) = Self::map_deals(&list.data, ctx.today);
        let metrics = normalize::derive_metrics(&invoices, 0.0, ctx.today);

        Ok(ProviderSummary {
            provider: ZOHO.to_owned(),
            connected_account: ctx.connected_account.to_owned(),
            last_synced_at: ctx.last_synced_at,
            cash_flow: None,
            invoices,
            transactions,
            metrics,
        })
    }
}
