// ABOUTME: Stripe payments adapter with platform-wide and customer-scoped entry points
// ABOUTME: Stripe reports amounts in minor units; every amount is divided by 100
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::STRIPE;
use crate::errors::{AppError, AppResult};
use crate::models::{CashFlow, Invoice, InvoiceStatus, ProviderSummary, Transaction, TransactionKind};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, normalize, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Native invoice shape. Amounts are minor units (cents); `due_date` and
/// `created` are unix timestamps.
#[derive(Debug, Deserialize)]
struct StripeInvoice {
    id: String,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    amount_due: i64,
    #[serde(default)]
    amount_paid: i64,
    currency: String,
    status: String,
    #[serde(default)]
    due_date: Option<i64>,
    #[serde(default)]
    created: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeBalance {
    #[serde(default)]
    available: Vec<StripeBalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct StripeBalanceEntry {
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    id: String,
    amount: i64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created: Option<i64>,
}

/// Payments adapter for Stripe
pub struct StripeAdapter;

impl StripeAdapter {
    async fn list<T: serde::de::DeserializeOwned>(
        ctx: &FetchContext<'_>,
        path: &str,
        params: &[(&str, &str)],
    ) -> AppResult<StripeList<T>> {
        let response = ctx
            .http
            .get(format!("{API_BASE}/{path}"))
            .bearer_auth(ctx.access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| transport_error(STRIPE, &e))?;

        check_status(STRIPE, &response)?;
        response
            .json()
            .await
            .map_err(|e| transport_error(STRIPE, &e))
    }

    fn map_invoice(native: &StripeInvoice, today: NaiveDate) -> Invoice {
        let due_date = normalize::date_from_unix(native.due_date);
        let status = match native.status.as_str() {
            "paid" => InvoiceStatus::Paid,
            "draft" => InvoiceStatus::Draft,
            // "open", "uncollectible", and anything new are treated as open
            _ => normalize::open_invoice_status(due_date, today),
        };

        Invoice {
            id: native.id.clone(),
            number: native.number.clone().unwrap_or_else(|| native.id.clone()),
            customer_name: native.customer_name.clone().unwrap_or_default(),
            // Minor units: divide by 100 before entering the shared shape
            amount: normalize::minor_units_to_major(if native.status == "paid" {
                native.amount_paid
            } else {
                native.amount_due
            }),
            currency: native.currency.to_uppercase(),
            status,
            due_date,
            created_date: normalize::date_from_unix(native.created),
        }
    }

    fn map_charge(native: &StripeCharge) -> Transaction {
        Transaction {
            id: native.id.clone(),
            date: normalize::date_from_unix(native.created),
            description: native
                .description
                .clone()
                .unwrap_or_else(|| "Charge".to_owned()),
            amount: normalize::minor_units_to_major(native.amount),
            kind: TransactionKind::Income,
        }
    }

    async fn build_summary(
        ctx: &FetchContext<'_>,
        invoice_params: &[(&str, &str)],
        include_balance: bool,
    ) -> AppResult<ProviderSummary> {
        let invoices_native: StripeList<StripeInvoice> =
            Self::list(ctx, "invoices", invoice_params).await?;
        let charges_native: StripeList<StripeCharge> =
            Self::list(ctx, "charges", invoice_params).await?;

        let invoices: Vec<Invoice> = invoices_native
            .data
            .iter()
            .map(|native| Self::map_invoice(native, ctx.today))
            .collect();
        let transactions: Vec<Transaction> =
            charges_native.data.iter().map(Self::map_charge).collect();

        let cash_flow = if include_balance {
            let balance: StripeBalance = {
                let response = ctx
                    .http
                    .get(format!("{API_BASE}/balance"))
                    .bearer_auth(ctx.access_token)
                    .send()
                    .await
                    .map_err(|e| transport_error(STRIPE, &e))?;
                check_status(STRIPE, &response)?;
                response
                    .json()
                    .await
                    .map_err(|e| transport_error(STRIPE, &e))?
            };

            balance.available.first().map(|entry| CashFlow {
                balance: normalize::minor_units_to_major(entry.amount),
                income: transactions.iter().map(|t| t.amount).sum(),
                expenses: 0.0,
                currency: entry.currency.to_uppercase(),
                period: "current".to_owned(),
            })
        } else {
            None
        };

        let metrics = normalize::derive_metrics(&invoices, 0.0, ctx.today);

        Ok(ProviderSummary {
            provider: STRIPE.to_owned(),
            connected_account: ctx.connected_account.to_owned(),
            last_synced_at: ctx.last_synced_at,
            cash_flow,
            invoices,
            transactions,
            metrics,
        })
    }
}

#[async_trait]
impl ProviderAdapter for StripeAdapter {
    fn name(&self) -> &'static str {
        STRIPE
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(STRIPE).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    /// Customer-scoped view: filters to the one external customer id captured
    /// at connect time
    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        let customer_id = ctx
            .scoped_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::ReconnectRequired(STRIPE.to_owned()))?;

        Self::build_summary(
            ctx,
            &[("customer", customer_id), ("limit", "100")],
            false,
        )
        .await
    }

    fn supports_platform_view(&self) -> bool {
        true
    }

    /// Platform-wide view across all customers. The orchestrator gates this
    /// behind the elevated role; it must never be reachable otherwise.
    async fn fetch_platform(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        Self::build_summary(ctx, &[("limit", "100")], true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
    }

    #[test]
    fn minor_units_are_normalized() {
        let native: StripeInvoice = serde_json::from_str(
            r#"{
                "id": "in_123",
                "number": "A-0042",
                "customer_name": "Acme Corp",
                "amount_due": 2550,
                "amount_paid": 0,
                "currency": "usd",
                "status": "open",
                "due_date": 1755000000,
                "created": 1750000000
            }"#,
        )
        .expect("parse");

        let invoice = StripeAdapter::map_invoice(&native, today());
        assert!((invoice.amount - 25.50).abs() < f64::EPSILON);
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    }

    #[test]
    fn open_invoice_past_due_is_overdue() {
        let native: StripeInvoice = serde_json::from_str(
            r#"{
                "id": "in_124",
                "amount_due": 10000,
                "amount_paid": 0,
                "currency": "usd",
                "status": "open",
                "due_date": 1749000000
            }"#,
        )
        .expect("parse");

        // 1749000000 is 2025-06-04, before the reference date
        let invoice = StripeAdapter::map_invoice(&native, today());
        assert_eq!(invoice.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn paid_and_draft_statuses_map_directly() {
        let paid: StripeInvoice = serde_json::from_str(
            r#"{"id": "in_1", "amount_due": 0, "amount_paid": 5000, "currency": "eur", "status": "paid"}"#,
        )
        .expect("parse");
        assert_eq!(StripeAdapter::map_invoice(&paid, today()).status, InvoiceStatus::Paid);
        assert!((StripeAdapter::map_invoice(&paid, today()).amount - 50.0).abs() < f64::EPSILON);

        let draft: StripeInvoice = serde_json::from_str(
            r#"{"id": "in_2", "amount_due": 100, "amount_paid": 0, "currency": "eur", "status": "draft"}"#,
        )
        .expect("parse");
        assert_eq!(
            StripeAdapter::map_invoice(&draft, today()).status,
            InvoiceStatus::Draft
        );
    }

    #[test]
    fn charges_map_to_income_transactions() {
        let native: StripeCharge = serde_json::from_str(
            r#"{"id": "ch_1", "amount": 1999, "description": "Subscription", "created": 1750000000}"#,
        )
        .expect("parse");

        let txn = StripeAdapter::map_charge(&native);
        assert_eq!(txn.kind, TransactionKind::Income);
        assert!((txn.amount - 19.99).abs() < f64::EPSILON);
    }
}
