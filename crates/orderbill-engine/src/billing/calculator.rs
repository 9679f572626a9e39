//! Billing calculator
//!
//! Produces a customer's billing report: every in-scope order is matched
//! against every selected customer-service, matching services are priced,
//! and the resulting order costs are folded into the report by a single
//! writer.
//!
//! Orders are independent of one another, so evaluation fans out over a
//! bounded set of scoped worker threads. Each worker reads the shared,
//! immutable catalog and returns its own order costs; merging happens on
//! the calling thread in input order. Cancellation is checked between
//! orders, and a cancelled run still returns a consistent report flagged as
//! partial.

use chrono::{NaiveDate, Utc};
use orderbill_common::{
    BillingReport, CalculationError, ConfigError, CustomerService, Order, OrderCost, ServiceCost,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::aggregator::{add_order_cost, merge_reports, recompute_totals};
use crate::catalog::ServiceCatalog;
use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use crate::pricing::{service_charge, OrderContext};
use crate::rules::service_applies;

/// What to bill: one customer over an inclusive date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub customer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `None` selects every active service; an empty set selects none
    #[serde(default)]
    pub included_customer_service_ids: Option<BTreeSet<String>>,
}

impl ReportRequest {
    pub fn new(customer_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            customer_id: customer_id.into(),
            start_date,
            end_date,
            included_customer_service_ids: None,
        }
    }

    /// Restrict the report to the given customer-service IDs
    pub fn with_services<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_customer_service_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    fn covers(&self, order: &Order) -> bool {
        order.customer_id == self.customer_id
            && self.start_date <= order.order_date
            && order.order_date <= self.end_date
    }
}

/// A charge left out of the report, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCharge {
    pub order_id: String,
    pub service_id: Option<String>,
    pub reason: String,
}

/// Outcome of one report generation
#[derive(Debug, Clone)]
pub struct BillingRun {
    pub report: BillingReport,
    /// Order/service pairs that failed and contributed nothing
    pub skipped: Vec<SkippedCharge>,
    /// Generation stopped early; `report.metadata.partial` is set too
    pub cancelled: bool,
}

/// Partial report built by one evaluation worker
#[derive(Debug)]
struct ChunkResult {
    report: BillingReport,
    skipped: Vec<SkippedCharge>,
    evaluated: u64,
    cancelled: bool,
}

/// Billing calculator over a validated service catalog
pub struct BillingCalculator {
    catalog: ServiceCatalog,
    config: EngineConfig,
    metrics: Option<Arc<EngineMetrics>>,
}

impl BillingCalculator {
    /// Validate `services` and build a calculator over them
    pub fn new(services: Vec<CustomerService>, config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_catalog(ServiceCatalog::new(services)?, config))
    }

    pub fn from_catalog(catalog: ServiceCatalog, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate the billing report for `request` from `orders`.
    ///
    /// Orders of other customers or outside the date range are ignored.
    /// Orders producing no charge are left out of the report.
    #[instrument(skip(self, orders, cancel), fields(customer_id = %request.customer_id))]
    pub fn generate_report(
        &self,
        request: &ReportRequest,
        orders: &[Order],
        cancel: Option<&CancellationToken>,
    ) -> BillingRun {
        let started = Instant::now();
        if request.start_date > request.end_date {
            warn!(start = %request.start_date, end = %request.end_date, "Empty date range");
        }

        let services = self
            .catalog
            .select(&request.customer_id, request.included_customer_service_ids.as_ref());
        let in_scope: Vec<&Order> = orders.iter().filter(|o| request.covers(o)).collect();
        let workers = self.config.workers_for(in_scope.len());
        debug!(
            orders = in_scope.len(),
            services = services.len(),
            workers,
            "Starting billing run"
        );

        let chunks = if services.is_empty() || in_scope.is_empty() {
            Vec::new()
        } else if workers <= 1 {
            vec![evaluate_chunk(request, &in_scope, &services, cancel)]
        } else {
            evaluate_parallel(request, &in_scope, &services, workers, cancel)
        };

        let mut report =
            BillingReport::new(&request.customer_id, request.start_date, request.end_date);
        let mut skipped = Vec::new();
        let mut evaluated = 0u64;
        let mut cancelled = false;
        for chunk in chunks {
            evaluated += chunk.evaluated;
            cancelled |= chunk.cancelled;
            skipped.extend(chunk.skipped);
            for (order_id, e) in merge_reports(&mut report, chunk.report) {
                skipped.push(rejected_order(order_id, e));
            }
        }
        if let Err(e) = recompute_totals(&mut report) {
            error!(error = %e, "Could not rebuild report totals");
        }

        report.metadata.selected_services = services.iter().map(|s| s.id.clone()).collect();
        report.metadata.generated_at = Utc::now();
        report.metadata.partial = cancelled;
        if cancelled {
            info!(processed = evaluated, in_scope = in_scope.len(), "Billing run cancelled");
        }

        if let Some(metrics) = &self.metrics {
            let recorded: usize = report.orders.iter().map(|o| o.service_costs.len()).sum();
            metrics.reports_generated.inc();
            metrics.orders_evaluated.inc_by(evaluated);
            metrics.orders_skipped.inc_by(skipped.len() as u64);
            metrics.service_costs_recorded.inc_by(recorded as u64);
            metrics
                .report_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }
        if !self.config.collect_diagnostics {
            skipped.clear();
        }

        info!(
            orders = report.orders.len(),
            total = %report.total_amount,
            skipped = skipped.len(),
            cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated billing report"
        );

        BillingRun {
            report,
            skipped,
            cancelled,
        }
    }
}

/// Fan contiguous chunks of orders out over scoped worker threads. Results
/// come back in chunk order, so merging them keeps input order.
fn evaluate_parallel(
    request: &ReportRequest,
    orders: &[&Order],
    services: &[&CustomerService],
    workers: usize,
    cancel: Option<&CancellationToken>,
) -> Vec<ChunkResult> {
    let chunk_size = orders.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = orders
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || evaluate_chunk(request, chunk, services, cancel));
                (chunk, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(chunk, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!(orders = chunk.len(), "Billing worker panicked, skipping its orders");
                    ChunkResult {
                        report: empty_report(request),
                        skipped: chunk
                            .iter()
                            .map(|order| SkippedCharge {
                                order_id: order.order_id.clone(),
                                service_id: None,
                                reason: "evaluation worker panicked".to_string(),
                            })
                            .collect(),
                        evaluated: 0,
                        cancelled: false,
                    }
                })
            })
            .collect()
    })
}

/// Evaluate a run of orders in order, stopping at cancellation
fn evaluate_chunk(
    request: &ReportRequest,
    orders: &[&Order],
    services: &[&CustomerService],
    cancel: Option<&CancellationToken>,
) -> ChunkResult {
    let mut result = ChunkResult {
        report: empty_report(request),
        skipped: Vec::new(),
        evaluated: 0,
        cancelled: false,
    };

    for order in orders {
        if is_cancelled(cancel) {
            result.cancelled = true;
            break;
        }
        let (cost, skipped) = guarded(order, || evaluate_order(order, services));
        result.evaluated += 1;
        result.skipped.extend(skipped);
        if let Some(cost) = cost {
            if let Err(e) = add_order_cost(&mut result.report, cost) {
                result.skipped.push(rejected_order(order.order_id.clone(), e));
            }
        }
    }
    result
}

/// Run one order's evaluation, skipping only that order if it panics
fn guarded(
    order: &Order,
    evaluate: impl FnOnce() -> (Option<OrderCost>, Vec<SkippedCharge>),
) -> (Option<OrderCost>, Vec<SkippedCharge>) {
    std::panic::catch_unwind(AssertUnwindSafe(evaluate)).unwrap_or_else(|_| {
        error!(order_id = %order.order_id, "Order evaluation panicked, skipping it");
        let skipped = SkippedCharge {
            order_id: order.order_id.clone(),
            service_id: None,
            reason: "order evaluation panicked".to_string(),
        };
        (None, vec![skipped])
    })
}

/// An order cost the report could not take without overflowing its totals
fn rejected_order(order_id: String, e: CalculationError) -> SkippedCharge {
    warn!(order_id = %order_id, error = %e, "Skipping order cost");
    SkippedCharge {
        order_id,
        service_id: None,
        reason: e.to_string(),
    }
}

fn empty_report(request: &ReportRequest) -> BillingReport {
    BillingReport::new(&request.customer_id, request.start_date, request.end_date)
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(|token| token.is_cancelled())
}

/// Price one order against the selected services
fn evaluate_order(
    order: &Order,
    services: &[&CustomerService],
) -> (Option<OrderCost>, Vec<SkippedCharge>) {
    let ctx = OrderContext::new(order);
    let mut cost = OrderCost::new(
        order.order_id.clone(),
        order.reference_number.clone(),
        order.order_date,
    );
    let mut skipped = Vec::new();

    for service in services {
        if !service_applies(order, service) {
            continue;
        }
        let charged = service_charge(service, &ctx).and_then(|amount| {
            if amount > Decimal::ZERO {
                cost.push(ServiceCost::new(
                    service.service_id.clone(),
                    service.service_name.clone(),
                    amount,
                ))
            } else {
                Ok(())
            }
        });
        if let Err(e) = charged {
            warn!(
                order_id = %order.order_id,
                service_id = %service.service_id,
                error = %e,
                "Skipping charge"
            );
            skipped.push(SkippedCharge {
                order_id: order.order_id.clone(),
                service_id: Some(service.service_id.clone()),
                reason: e.to_string(),
            });
        }
    }

    ((!cost.is_empty()).then_some(cost), skipped)
}
