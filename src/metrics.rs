use std::collections::HashMap;

use anyhow::Result;
use tracing::info;

use crate::database::DatabaseManager;
use crate::models::{CalculatedMetric, MetricCategory};

/// Flat metric name -> value map for one company and fiscal year
pub type StatementData = HashMap<String, f64>;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn metric(name: &str, value: f64, category: MetricCategory) -> CalculatedMetric {
    CalculatedMetric {
        metric_name: name.to_string(),
        metric_value: round2(value),
        metric_category: category,
    }
}

fn get(data: &StatementData, name: &str) -> Option<f64> {
    data.get(name).copied()
}

/// Margin ratios for one fiscal year. Skipped entirely without positive
/// revenue; each numerator guards its own presence.
pub fn profitability_metrics(data: &StatementData) -> Vec<CalculatedMetric> {
    let mut metrics = Vec::new();

    let revenue = get(data, "total_revenue").unwrap_or(0.0);
    if revenue > 0.0 {
        let cost_of_revenue = get(data, "cost_of_revenue").unwrap_or(0.0);
        metrics.push(metric(
            "gross_margin_pct",
            (revenue - cost_of_revenue) / revenue * 100.0,
            MetricCategory::Profitability,
        ));

        if let Some(operating_income) = get(data, "operating_income") {
            metrics.push(metric(
                "operating_margin_pct",
                operating_income / revenue * 100.0,
                MetricCategory::Profitability,
            ));
        }

        if let Some(net_income) = get(data, "net_income") {
            metrics.push(metric(
                "net_margin_pct",
                net_income / revenue * 100.0,
                MetricCategory::Profitability,
            ));
        }
    }

    metrics
}

/// Current and quick ratios; skipped without positive current liabilities
pub fn liquidity_metrics(data: &StatementData) -> Vec<CalculatedMetric> {
    let mut metrics = Vec::new();

    let current_liabilities = get(data, "current_liabilities").unwrap_or(0.0);
    if current_liabilities > 0.0 {
        let current_assets = get(data, "current_assets").unwrap_or(0.0);
        metrics.push(metric(
            "current_ratio",
            current_assets / current_liabilities,
            MetricCategory::Liquidity,
        ));

        let inventory = get(data, "inventory").unwrap_or(0.0);
        metrics.push(metric(
            "quick_ratio",
            (current_assets - inventory) / current_liabilities,
            MetricCategory::Liquidity,
        ));
    }

    metrics
}

/// Asset turnover against the two-year average asset base
pub fn efficiency_metrics(data: &StatementData, prev_data: &StatementData) -> Vec<CalculatedMetric> {
    let mut metrics = Vec::new();

    let revenue = get(data, "total_revenue").unwrap_or(0.0);

    if let (Some(total_assets), Some(prev_assets)) =
        (get(data, "total_assets"), get(prev_data, "total_assets"))
    {
        let avg_assets = (total_assets + prev_assets) / 2.0;
        if avg_assets > 0.0 && revenue > 0.0 {
            metrics.push(metric(
                "asset_turnover",
                revenue / avg_assets,
                MetricCategory::Efficiency,
            ));
        }
    }

    metrics
}

/// Year-over-year growth against the nearest older fiscal year with data
pub fn growth_metrics(data: &StatementData, prev_data: &StatementData) -> Vec<CalculatedMetric> {
    let mut metrics = Vec::new();

    let revenue = get(data, "total_revenue").unwrap_or(0.0);
    if let Some(prev_revenue) = get(prev_data, "total_revenue") {
        if prev_revenue > 0.0 {
            metrics.push(metric(
                "revenue_yoy_pct",
                (revenue - prev_revenue) / prev_revenue * 100.0,
                MetricCategory::Growth,
            ));
        }
    }

    let net_income = get(data, "net_income").unwrap_or(0.0);
    if let Some(prev_net_income) = get(prev_data, "net_income") {
        // Absolute denominator keeps the sign of the swing, so loss-to-profit
        // reads as a large positive change instead of a sign-flip artifact
        if prev_net_income != 0.0 {
            metrics.push(metric(
                "net_income_yoy_pct",
                (net_income - prev_net_income) / prev_net_income.abs() * 100.0,
                MetricCategory::Growth,
            ));
        }
    }

    metrics
}

/// Calculate derived metrics from persisted statement rows
pub struct MetricsCalculator {
    database: DatabaseManager,
}

impl MetricsCalculator {
    pub fn new(database: DatabaseManager) -> Self {
        Self { database }
    }

    /// Recompute every derived metric for every fiscal year this company has
    /// statement data for, reading only the persisted rows
    pub async fn calculate_all_metrics(&self, company_id: i64) -> Result<()> {
        let years = self.database.get_statement_years(company_id).await?;
        info!("Calculating metrics for company {}, years: {:?}", company_id, years);

        for (i, &year) in years.iter().enumerate() {
            let data = self.database.get_statement_data(company_id, year).await?;

            // Previous year is the next-older year actually present, not
            // necessarily year - 1
            let prev_data = match years.get(i + 1) {
                Some(&prev_year) => {
                    Some(self.database.get_statement_data(company_id, prev_year).await?)
                }
                None => None,
            };

            let mut all_metrics = profitability_metrics(&data);
            all_metrics.extend(liquidity_metrics(&data));

            if let Some(prev_data) = &prev_data {
                all_metrics.extend(efficiency_metrics(&data, prev_data));
                all_metrics.extend(growth_metrics(&data, prev_data));
            }

            self.database
                .upsert_metrics(company_id, year, &all_metrics)
                .await?;
            info!("✓ Calculated {} metrics for year {}", all_metrics.len(), year);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data(entries: &[(&str, f64)]) -> StatementData {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn value_of(metrics: &[CalculatedMetric], name: &str) -> Option<f64> {
        metrics
            .iter()
            .find(|m| m.metric_name == name)
            .map(|m| m.metric_value)
    }

    #[test]
    fn test_profitability_scenario() {
        let metrics = profitability_metrics(&data(&[
            ("total_revenue", 1000.0),
            ("cost_of_revenue", 600.0),
            ("operating_income", 200.0),
            ("net_income", 100.0),
        ]));

        assert_eq!(value_of(&metrics, "gross_margin_pct"), Some(40.0));
        assert_eq!(value_of(&metrics, "operating_margin_pct"), Some(20.0));
        assert_eq!(value_of(&metrics, "net_margin_pct"), Some(10.0));
        assert!(metrics
            .iter()
            .all(|m| m.metric_category == MetricCategory::Profitability));
    }

    #[test]
    fn test_profitability_skipped_without_positive_revenue() {
        assert!(profitability_metrics(&data(&[("net_income", 100.0)])).is_empty());
        assert!(profitability_metrics(&data(&[
            ("total_revenue", 0.0),
            ("net_income", 100.0),
        ]))
        .is_empty());
    }

    #[test]
    fn test_profitability_margins_need_their_numerator() {
        let metrics = profitability_metrics(&data(&[("total_revenue", 1000.0)]));

        // Gross margin still computes with cost of revenue defaulted to zero
        assert_eq!(value_of(&metrics, "gross_margin_pct"), Some(100.0));
        assert_eq!(value_of(&metrics, "operating_margin_pct"), None);
        assert_eq!(value_of(&metrics, "net_margin_pct"), None);
    }

    #[test]
    fn test_liquidity_scenario() {
        let metrics = liquidity_metrics(&data(&[
            ("current_assets", 500.0),
            ("current_liabilities", 250.0),
            ("inventory", 100.0),
        ]));

        assert_eq!(value_of(&metrics, "current_ratio"), Some(2.0));
        assert_eq!(value_of(&metrics, "quick_ratio"), Some(1.6));
    }

    #[test]
    fn test_liquidity_inventory_defaults_to_zero() {
        let metrics = liquidity_metrics(&data(&[
            ("current_assets", 500.0),
            ("current_liabilities", 250.0),
        ]));

        assert_eq!(value_of(&metrics, "quick_ratio"), Some(2.0));
    }

    #[test]
    fn test_liquidity_skipped_with_zero_liabilities() {
        assert!(liquidity_metrics(&data(&[
            ("current_assets", 500.0),
            ("current_liabilities", 0.0),
        ]))
        .is_empty());
    }

    #[test]
    fn test_asset_turnover_uses_average_assets() {
        let metrics = efficiency_metrics(
            &data(&[("total_revenue", 300.0), ("total_assets", 400.0)]),
            &data(&[("total_assets", 200.0)]),
        );

        assert_eq!(value_of(&metrics, "asset_turnover"), Some(1.0));
    }

    #[test]
    fn test_asset_turnover_needs_both_years() {
        assert!(efficiency_metrics(
            &data(&[("total_revenue", 300.0), ("total_assets", 400.0)]),
            &data(&[]),
        )
        .is_empty());

        assert!(efficiency_metrics(
            &data(&[("total_revenue", 300.0)]),
            &data(&[("total_assets", 200.0)]),
        )
        .is_empty());
    }

    #[test]
    fn test_revenue_yoy_growth() {
        let metrics = growth_metrics(
            &data(&[("total_revenue", 1200.0)]),
            &data(&[("total_revenue", 1000.0)]),
        );

        assert_eq!(value_of(&metrics, "revenue_yoy_pct"), Some(20.0));
    }

    #[test]
    fn test_revenue_yoy_skipped_without_positive_prior_revenue() {
        assert!(growth_metrics(
            &data(&[("total_revenue", 1200.0)]),
            &data(&[("total_revenue", 0.0)]),
        )
        .is_empty());

        assert!(growth_metrics(&data(&[("total_revenue", 1200.0)]), &data(&[])).is_empty());
    }

    #[test]
    fn test_net_income_yoy_preserves_sign_through_absolute_denominator() {
        // Loss to profit reads as a large positive swing
        let metrics = growth_metrics(
            &data(&[("net_income", 50.0)]),
            &data(&[("net_income", -100.0)]),
        );
        assert_eq!(value_of(&metrics, "net_income_yoy_pct"), Some(150.0));

        // Profit to deeper profit stays a plain percentage
        let metrics = growth_metrics(
            &data(&[("net_income", 150.0)]),
            &data(&[("net_income", 100.0)]),
        );
        assert_eq!(value_of(&metrics, "net_income_yoy_pct"), Some(50.0));
    }

    #[test]
    fn test_net_income_yoy_skipped_with_zero_prior() {
        assert!(growth_metrics(
            &data(&[("net_income", 50.0)]),
            &data(&[("net_income", 0.0)]),
        )
        .is_empty());
    }

    #[test]
    fn test_values_rounded_to_two_decimals() {
        let metrics = profitability_metrics(&data(&[
            ("total_revenue", 3000.0),
            ("cost_of_revenue", 1000.0),
        ]));

        // 2000/3000 * 100 = 66.666...
        assert_eq!(value_of(&metrics, "gross_margin_pct"), Some(66.67));
    }

    #[test]
    fn test_no_metric_is_nan_or_infinite() {
        let zeroed = data(&[
            ("total_revenue", 0.0),
            ("current_liabilities", 0.0),
            ("total_assets", 0.0),
            ("net_income", 0.0),
        ]);

        let mut all = profitability_metrics(&zeroed);
        all.extend(liquidity_metrics(&zeroed));
        all.extend(efficiency_metrics(&zeroed, &zeroed));
        all.extend(growth_metrics(&zeroed, &zeroed));

        assert!(all.iter().all(|m| m.metric_value.is_finite()));
        assert!(all.is_empty());
    }
}
