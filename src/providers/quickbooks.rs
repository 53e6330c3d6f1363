// ABOUTME: QuickBooks Online accounting adapter: invoices, bills, and cash flow
// ABOUTME: Amounts arrive in major units; the company (realm) id comes from connect time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::QUICKBOOKS;
use crate::errors::{AppError, AppResult};
use crate::models::{CashFlow, Invoice, InvoiceStatus, ProviderSummary, Transaction, TransactionKind};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, normalize, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const API_BASE: &str = "https://quickbooks.api.intuit.com/v3/company";

/// QuickBooks query envelope
#[derive(Debug, Deserialize)]
struct QboQueryEnvelope {
    #[serde(rename = "QueryResponse", default)]
    query_response: QboQueryResponse,
}

#[derive(Debug, Default, Deserialize)]
struct QboQueryResponse {
    #[serde(rename = "Invoice", default)]
    invoices: Vec<QboInvoice>,
    #[serde(rename = "Bill", default)]
    bills: Vec<QboBill>,
}

/// Native invoice shape. QuickBooks reports amounts in major currency units;
/// no minor-unit conversion applies here.
#[derive(Debug, Deserialize)]
struct QboInvoice {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "DocNumber", default)]
    doc_number: Option<String>,
    #[serde(rename = "CustomerRef", default)]
    customer_ref: Option<QboRef>,
    #[serde(rename = "TotalAmt", default)]
    total_amount: f64,
    #[serde(rename = "Balance", default)]
    balance: f64,
    #[serde(rename = "CurrencyRef", default)]
    currency_ref: Option<QboRef>,
    #[serde(rename = "DueDate", default)]
    due_date: Option<String>,
    #[serde(rename = "TxnDate", default)]
    txn_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QboBill {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "VendorRef", default)]
    vendor_ref: Option<QboRef>,
    #[serde(rename = "TotalAmt", default)]
    total_amount: f64,
    #[serde(rename = "Balance", default)]
    balance: f64,
    #[serde(rename = "TxnDate", default)]
    txn_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QboRef {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// Accounting adapter for QuickBooks Online
pub struct QuickBooksAdapter;

impl QuickBooksAdapter {
    async fn query(
        ctx: &FetchContext<'_>,
        realm_id: &str,
        statement: &str,
    ) -> AppResult<QboQueryResponse> {
        let url = format!("{API_BASE}/{realm_id}/query");
        let response = ctx
            .http
            .get(&url)
            .bearer_auth(ctx.access_token)
            .header("Accept", "application/json")
            .query(&[("query", statement)])
            .send()
            .await
            .map_err(|e| transport_error(QUICKBOOKS, &e))?;

        check_status(QUICKBOOKS, &response)?;
        let envelope: QboQueryEnvelope = response
            .json()
            .await
            .map_err(|e| transport_error(QUICKBOOKS, &e))?;
        Ok(envelope.query_response)
    }

    fn map_invoice(native: &QboInvoice, today: NaiveDate) -> Invoice {
        // Paid state is driven by the open balance, not a status string
        let due_date = normalize::parse_date(native.due_date.as_deref());
        let status = if native.balance <= 0.0 {
            InvoiceStatus::Paid
        } else {
            normalize::open_invoice_status(due_date, today)
        };

        Invoice {
            id: native.id.clone(),
            number: native.doc_number.clone().unwrap_or_else(|| native.id.clone()),
            customer_name: native
                .customer_ref
                .as_ref()
                .and_then(|r| r.name.clone())
                .unwrap_or_default(),
            amount: native.total_amount,
            currency: native
                .currency_ref
                .as_ref()
                .and_then(|r| r.value.clone())
                .unwrap_or_else(|| "USD".to_owned()),
            status,
            due_date,
            created_date: normalize::parse_date(native.txn_date.as_deref()),
        }
    }

    fn map_bill(native: &QboBill) -> Transaction {
        Transaction {
            id: native.id.clone(),
            date: normalize::parse_date(native.txn_date.as_deref()),
            description: native
                .vendor_ref
                .as_ref()
                .and_then(|r| r.name.clone())
                .unwrap_or_else(|| "Bill".to_owned()),
            amount: -native.total_amount,
            kind: TransactionKind::Expense,
        }
    }
}

#[async_trait]
impl ProviderAdapter for QuickBooksAdapter {
    fn name(&self) -> &'static str {
        QUICKBOOKS
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(QUICKBOOKS).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        // The realm id is captured once at connect time and not re-derivable;
        // losing it is a user-actionable reconnect, not a generic failure
        let realm_id = ctx
            .scoped_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::ReconnectRequired(QUICKBOOKS.to_owned()))?;

        let invoice_response =
            Self::query(ctx, realm_id, "SELECT * FROM Invoice ORDERBY TxnDate DESC MAXRESULTS 100")
                .await?;
        let bill_response =
            Self::query(ctx, realm_id, "SELECT * FROM Bill ORDERBY TxnDate DESC MAXRESULTS 100")
                .await?;

        let invoices: Vec<Invoice> = invoice_response
            .invoices
            .iter()
            .map(|native| Self::map_invoice(native, ctx.today))
            .collect();

        let total_payable: f64 = bill_response.bills.iter().map(|b| b.balance).sum();
        let transactions: Vec<Transaction> =
            bill_response.bills.iter().map(Self::map_bill).collect();

        let income: f64 = invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .map(|i| i.amount)
            .sum();
        let expenses: f64 = transactions.iter().map(|t| -t.amount).sum();
        let currency = invoices
            .first()
            .map_or_else(|| "USD".to_owned(), |i| i.currency.clone());

        let metrics = normalize::derive_metrics(&invoices, total_payable, ctx.today);

        Ok(ProviderSummary {
            provider: QUICKBOOKS.to_owned(),
            connected_account: ctx.connected_account.to_owned(),
            last_synced_at: ctx.last_synced_at,
            cash_flow: Some(CashFlow {
                balance: income - expenses,
                income,
                expenses,
                currency,
                period: "all_time".to_owned(),
            }),
            invoices,
            transactions,
            metrics,
        })
    }
}
