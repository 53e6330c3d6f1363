// ABOUTME: HubSpot CRM adapter: deals normalized into the unified summary shape
// ABOUTME: Deal amounts arrive as major-unit decimal strings; no conversion applies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::HUBSPOT;
use crate::errors::AppResult;
use crate::models::{Invoice, ProviderSummary, Transaction, TransactionKind};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, normalize, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const DEALS_URL: &str = "https://api.hubapi.com/crm/v3/objects/deals";

#[derive(Debug, Deserialize)]
struct HubSpotDealList {
    #[serde(default)]
    results: Vec<HubSpotDeal>,
}

#[derive(Debug, Deserialize)]
struct HubSpotDeal {
    id: String,
    properties: HubSpotDealProperties,
}

#[derive(Debug, Deserialize)]
struct HubSpotDealProperties {
    #[serde(default)]
    dealname: Option<String>,
    /// Major-unit decimal string, e.g. "2500.00"
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    dealstage: Option<String>,
    /// ISO date-time; only the date part is used
    #[serde(default)]
    closedate: Option<String>,
}

/// CRM adapter for HubSpot.
///
/// Open deals become unpaid invoices expected by their close date; won deals
/// become income transactions; lost deals are dropped.
pub struct HubSpotAdapter;

impl HubSpotAdapter {
    fn deal_amount(properties: &HubSpotDealProperties) -> f64 {
        properties
            .amount
            .as_deref()
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    fn close_date(properties: &HubSpotDealProperties) -> Option<NaiveDate> {
        properties
            .closedate
            .as_deref()
            .map(|raw| raw.get(..10).unwrap_or(raw))
            .and_then(|date| normalize::parse_date(Some(date)))
    }

    fn map_deals(
        deals: &[HubSpotDeal],
        today: NaiveDate,
    ) -> (Vec<Invoice>, Vec<Transaction>) {
        let mut invoices = Vec::new();
        let mut transactions = Vec::new();

        for deal in deals {
            let name = deal
                .properties
                .dealname
                .clone()
                .unwrap_or_else(|| format!("Deal {}", deal.id));
            let amount = Self::deal_amount(&deal.properties);
            let close_date = Self::close_date(&deal.properties);

            match deal.properties.dealstage.as_deref() {
                Some("closedwon") => transactions.push(Transaction {
                    id: deal.id.clone(),
                    date: close_date,
                    description: name,
                    amount,
                    kind: TransactionKind::Income,
                }),
                Some("closedlost") => {}
                _ => invoices.push(Invoice {
                    id: deal.id.clone(),
                    number: deal.id.clone(),
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
impl ProviderAdapter for HubSpotAdapter {
    fn name(&self) -> &'static str {
        HUBSPOT
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(HUBSPOT).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        let response = ctx
            .http
            .get(DEALS_URL)
            .bearer_auth(ctx.access_token)
            .query(&[
                ("properties", "dealname,amount,dealstage,closedate"),
                ("limit", "100"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(HUBSPOT, &e))?;

        check_status(HUBSPOT, &response)?;
        let list: HubSpotDealList = response
            .json()
            .await
            .map_err(|e| transport_error(HUBSPOT, &e))?;

        let (invoices, transactions) = Self::map_deals(&list.results, ctx.today);
        let metrics = normalize::derive_metrics(&invoices, 0.0, ctx.today);

        Ok(ProviderSummary {
            provider: HUBSPOT.to_owned(),
            connected_account: ctx.connected_account.to_owned(),
            last_synced_at: ctx.last_synced_at,
            cash_flow: None,
            invoices,
            transactions,
            metrics,
        })
    }
}
