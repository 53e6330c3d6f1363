// ABOUTME: Normalization helpers every adapter shares: overdue logic, unit conversion
// ABOUTME: Overdue is a derived judgment computed identically across all adapters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::oauth_flow::UPCOMING_PAYMENT_DAYS;
use crate::models::{Invoice, InvoiceStatus, SummaryMetrics};
use chrono::{Duration, NaiveDate};

/// Status for an invoice the provider reports as open/unpaid.
///
/// Overdue is not a field providers return; it is derived: open AND due date
/// strictly in the past relative to call time. Due today is still `Unpaid`.
#[must_use]
pub fn open_invoice_status(due_date: Option<NaiveDate>, today: NaiveDate) -> InvoiceStatus {
    match due_date {
        Some(due) if due < today => InvoiceStatus::Overdue,
        _ => InvoiceStatus::Unpaid,
    }
}

/// Convert an amount in minor currency units (cents) to major units.
///
/// Adapters whose source API already reports major units must not call this.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn minor_units_to_major(amount_minor: i64) -> f64 {
    amount_minor as f64 / 100.0
}

/// Derive the summary metrics over a normalized invoice list.
///
/// `total_payable` comes from the adapter when its source exposes outward
/// obligations (bills); most sources do not, so it defaults to zero.
#[must_use]
pub fn derive_metrics(invoices: &[Invoice], total_payable: f64, today: NaiveDate) -> SummaryMetrics {
    let upcoming_cutoff = today + Duration::days(UPCOMING_PAYMENT_DAYS);

    let mut metrics = SummaryMetrics {
        total_payable,
        ..SummaryMetrics::default()
    };

    for invoice in invoices {
        match invoice.status {
            InvoiceStatus::Overdue => {
                metrics.total_receivable += invoice.amount;
                metrics.overdue_count += 1;
            }
            InvoiceStatus::Unpaid => {
                metrics.total_receivable += invoice.amount;
                if invoice
                    .due_date
                    .is_some_and(|due| due >= today && due <= upcoming_cutoff)
                {
                    metrics.upcoming_count += 1;
                }
            }
            InvoiceStatus::Paid | InvoiceStatus::Draft => {}
        }
    }

    metrics
}

/// Parse a provider date string in `YYYY-MM-DD` form, tolerating absence
#[must_use]
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

/// Convert a unix timestamp (seconds) to a calendar date
#[must_use]
pub fn date_from_unix(timestamp: Option<i64>) -> Option<NaiveDate> {
    timestamp
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
}
