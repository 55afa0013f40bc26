//! Daily facts per child ASIN and their parent-ASIN rollup
//!
//! Organic metrics are traffic totals minus ad-attributed figures, floored at
//! zero. Ratios are null-safe: a zero or missing denominator yields `None`
//! (`NULL` in SQL). The metric, organic and ratio tables below drive both the
//! generated SQL and the in-process computation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use super::cost_interval::{validity_window_sql, CostSchedule};
use super::sql::{floored_difference, safe_ratio, zero_if_null, WarehouseTables};
use super::{non_negative_difference, safe_divide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Sessions,
    PageViews,
    UnitsOrdered,
    TotalSales,
    AdImpressions,
    AdClicks,
    AdCost,
    AdSales,
    AdUnitsSold,
    OrganicSessions,
    OrganicUnits,
    OrganicSales,
}

/// Output column order
pub const METRICS: [Metric; 12] = [
    Metric::Sessions,
    Metric::PageViews,
    Metric::UnitsOrdered,
    Metric::TotalSales,
    Metric::AdImpressions,
    Metric::AdClicks,
    Metric::AdCost,
    Metric::AdSales,
    Metric::AdUnitsSold,
    Metric::OrganicSessions,
    Metric::OrganicUnits,
    Metric::OrganicSales,
];

/// (organic metric, traffic total, ad-attributed part)
pub const ORGANIC: [(Metric, Metric, Metric); 3] = [
    (Metric::OrganicSessions, Metric::Sessions, Metric::AdClicks),
    (Metric::OrganicUnits, Metric::UnitsOrdered, Metric::AdUnitsSold),
    (Metric::OrganicSales, Metric::TotalSales, Metric::AdSales),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioDef {
    pub name: &'static str,
    pub numerator: Metric,
    pub denominator: Metric,
}

pub const RATIOS: [RatioDef; 6] = [
    RatioDef {
        name: "tacos",
        numerator: Metric::AdCost,
        denominator: Metric::TotalSales,
    },
    RatioDef {
        name: "acos",
        numerator: Metric::AdCost,
        denominator: Metric::AdSales,
    },
    RatioDef {
        name: "total_cvr",
        numerator: Metric::UnitsOrdered,
        denominator: Metric::Sessions,
    },
    RatioDef {
        name: "ad_cvr",
        numerator: Metric::AdUnitsSold,
        denominator: Metric::AdClicks,
    },
    RatioDef {
        name: "organic_cvr",
        numerator: Metric::OrganicUnits,
        denominator: Metric::OrganicSessions,
    },
    RatioDef {
        name: "cpc",
        numerator: Metric::AdCost,
        denominator: Metric::AdClicks,
    },
];

impl Metric {
    pub fn column(self) -> &'static str {
        match self {
            Metric::Sessions => "sessions",
            Metric::PageViews => "page_views",
            Metric::UnitsOrdered => "units_ordered",
            Metric::TotalSales => "total_sales",
            Metric::AdImpressions => "ad_impressions",
            Metric::AdClicks => "ad_clicks",
            Metric::AdCost => "ad_cost",
            Metric::AdSales => "ad_sales",
            Metric::AdUnitsSold => "ad_units_sold",
            Metric::OrganicSessions => "organic_sessions",
            Metric::OrganicUnits => "organic_units",
            Metric::OrganicSales => "organic_sales",
        }
    }

    /// (traffic total, ad-attributed part) for organic metrics
    pub fn organic_parts(self) -> Option<(Metric, Metric)> {
        ORGANIC
            .iter()
            .find(|(m, _, _)| *m == self)
            .map(|(_, total, ad)| (*total, *ad))
    }

    /// Expression over the joined `t` (traffic) and `a` (ads) sources
    fn source_expr(self) -> String {
        if let Some((total, ad)) = self.organic_parts() {
            return floored_difference(&total.source_expr(), &ad.source_expr());
        }
        match self {
            Metric::Sessions => "t.sessions".to_string(),
            Metric::PageViews => "t.page_views".to_string(),
            Metric::UnitsOrdered => "t.units_ordered".to_string(),
            Metric::TotalSales => "t.ordered_product_sales".to_string(),
            _ => zero_if_null(&format!("a.{}", self.column())),
        }
    }
}

/// Daily traffic for one child ASIN
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTraffic {
    pub report_date: NaiveDate,
    pub child_asin: String,
    pub parent_asin: String,
    pub units_ordered: i64,
    pub ordered_product_sales: Decimal,
    pub total_order_items: i64,
    pub sessions: i64,
    pub page_views: i64,
}

/// One advertised-product row of the ads report
#[derive(Debug, Clone, PartialEq)]
pub struct AdProductRow {
    pub report_date: NaiveDate,
    pub advertised_asin: String,
    pub impressions: i64,
    pub clicks: i64,
    pub ad_cost: Decimal,
    pub ad_sales_7d: Decimal,
    pub ad_purchases_7d: i64,
    pub ad_units_sold_7d: i64,
}

/// Ads aggregated per date and ASIN
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdTotals {
    pub impressions: i64,
    pub clicks: i64,
    pub cost: Decimal,
    pub sales: Decimal,
    pub purchases: i64,
    pub units_sold: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub asin: String,
    pub amazon_sku: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventorySnapshot {
    pub asin: String,
    pub fulfillable_quantity: i64,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

/// Additive daily metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyMetrics {
    pub sessions: i64,
    pub page_views: i64,
    pub units_ordered: i64,
    pub total_sales: Decimal,
    pub ad_impressions: i64,
    pub ad_clicks: i64,
    pub ad_cost: Decimal,
    pub ad_sales: Decimal,
    pub ad_units_sold: i64,
    pub organic_sessions: i64,
    pub organic_units: i64,
    pub organic_sales: Decimal,
}

impl DailyMetrics {
    pub fn from_sources(traffic: &DailyTraffic, ads: Option<&AdTotals>) -> Self {
        let ads = ads.cloned().unwrap_or_default();
        Self {
            sessions: traffic.sessions,
            page_views: traffic.page_views,
            units_ordered: traffic.units_ordered,
            total_sales: traffic.ordered_product_sales,
            ad_impressions: ads.impressions,
            ad_clicks: ads.clicks,
            ad_cost: ads.cost,
            ad_sales: ads.sales,
            ad_units_sold: ads.units_sold,
            organic_sessions: traffic.sessions.saturating_sub(ads.clicks).max(0),
            organic_units: traffic.units_ordered.saturating_sub(ads.units_sold).max(0),
            organic_sales: non_negative_difference(traffic.ordered_product_sales, ads.sales),
        }
    }

    pub fn value(&self, metric: Metric) -> Decimal {
        match metric {
            Metric::Sessions => self.sessions.into(),
            Metric::PageViews => self.page_views.into(),
            Metric::UnitsOrdered => self.units_ordered.into(),
            Metric::TotalSales => self.total_sales,
            Metric::AdImpressions => self.ad_impressions.into(),
            Metric::AdClicks => self.ad_clicks.into(),
            Metric::AdCost => self.ad_cost,
            Metric::AdSales => self.ad_sales,
            Metric::AdUnitsSold => self.ad_units_sold.into(),
            Metric::OrganicSessions => self.organic_sessions.into(),
            Metric::OrganicUnits => self.organic_units.into(),
            Metric::OrganicSales => self.organic_sales,
        }
    }

    pub fn ratio(&self, name: &str) -> Option<Decimal> {
        let def = RATIOS.iter().find(|r| r.name == name)?;
        safe_divide(self.value(def.numerator), self.value(def.denominator))
    }

    /// All ratios in output order
    pub fn ratios(&self) -> Vec<(&'static str, Option<Decimal>)> {
        RATIOS
            .iter()
            .map(|r| (r.name, safe_divide(self.value(r.numerator), self.value(r.denominator))))
            .collect()
    }

    fn accumulate(&mut self, other: &DailyMetrics) {
        self.sessions += other.sessions;
        self.page_views += other.page_views;
        self.units_ordered += other.units_ordered;
        self.total_sales += other.total_sales;
        self.ad_impressions += other.ad_impressions;
        self.ad_clicks += other.ad_clicks;
        self.ad_cost += other.ad_cost;
        self.ad_sales += other.ad_sales;
        self.ad_units_sold += other.ad_units_sold;
        self.organic_sessions += other.organic_sessions;
        self.organic_units += other.organic_units;
        self.organic_sales += other.organic_sales;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyAsinFact {
    pub report_date: NaiveDate,
    pub child_asin: String,
    pub parent_asin: String,
    pub product_name: String,
    pub sku: String,
    pub metrics: DailyMetrics,
    pub standard_cost_per_unit: Option<Decimal>,
    pub estimated_cogs: Decimal,
    pub estimated_profit: Decimal,
    pub inventory_level: i64,
}

impl DailyAsinFact {
    pub fn compute(
        traffic: &DailyTraffic,
        product: Option<&ProductInfo>,
        ads: Option<&AdTotals>,
        standard_cost: Option<Decimal>,
        inventory_level: Option<i64>,
    ) -> Self {
        let metrics = DailyMetrics::from_sources(traffic, ads);
        let estimated_cogs =
            Decimal::from(traffic.units_ordered) * standard_cost.unwrap_or(Decimal::ZERO);
        let estimated_profit = traffic.ordered_product_sales - estimated_cogs - metrics.ad_cost;
        Self {
            report_date: traffic.report_date,
            child_asin: traffic.child_asin.clone(),
            parent_asin: traffic.parent_asin.clone(),
            product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
            sku: product.map(|p| p.amazon_sku.clone()).unwrap_or_default(),
            metrics,
            standard_cost_per_unit: standard_cost,
            estimated_cogs,
            estimated_profit,
            inventory_level: inventory_level.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentAsinFact {
    pub report_date: NaiveDate,
    pub parent_asin: String,
    pub product_name: String,
    pub metrics: DailyMetrics,
    pub estimated_cogs: Decimal,
    pub estimated_profit: Decimal,
    pub inventory_level: i64,
}

pub fn aggregate_ads(rows: &[AdProductRow]) -> HashMap<(NaiveDate, String), AdTotals> {
    let mut totals: HashMap<(NaiveDate, String), AdTotals> = HashMap::new();
    for row in rows {
        let t = totals
            .entry((row.report_date, row.advertised_asin.clone()))
            .or_default();
        t.impressions += row.impressions;
        t.clicks += row.clicks;
        t.cost += row.ad_cost;
        t.sales += row.ad_sales_7d;
        t.purchases += row.ad_purchases_7d;
        t.units_sold += row.ad_units_sold_7d;
    }
    totals
}

/// Most recent snapshot quantity per ASIN
pub fn latest_inventory(snapshots: &[InventorySnapshot]) -> HashMap<String, i64> {
    let mut latest: HashMap<String, &InventorySnapshot> = HashMap::new();
    for snap in snapshots {
        latest
            .entry(snap.asin.clone())
            .and_modify(|cur| {
                if snap.fetched_at > cur.fetched_at {
                    *cur = snap;
                }
            })
            .or_insert(snap);
    }
    latest
        .into_iter()
        .map(|(asin, snap)| (asin, snap.fulfillable_quantity))
        .collect()
}

/// The child-ASIN fact table, one row per traffic row
pub fn build_daily_facts(
    traffic: &[DailyTraffic],
    products: &[ProductInfo],
    ads: &[AdProductRow],
    costs: &CostSchedule,
    inventory: &[InventorySnapshot],
) -> Vec<DailyAsinFact> {
    let products: HashMap<&str, &ProductInfo> =
        products.iter().map(|p| (p.asin.as_str(), p)).collect();
    let ads = aggregate_ads(ads);
    let inventory = latest_inventory(inventory);

    traffic
        .iter()
        .map(|t| {
            DailyAsinFact::compute(
                t,
                products.get(t.child_asin.as_str()).copied(),
                ads.get(&(t.report_date, t.child_asin.clone())),
                costs.cost_on(&t.child_asin, t.report_date),
                inventory.get(&t.child_asin).copied(),
            )
        })
        .collect()
}

/// Sum child rows per (date, parent ASIN); ratios are recomputed from sums.
pub fn rollup_parents(facts: &[DailyAsinFact]) -> Vec<ParentAsinFact> {
    let mut groups: BTreeMap<(NaiveDate, String), ParentAsinFact> = BTreeMap::new();
    for fact in facts {
        let key = (fact.report_date, fact.parent_asin.clone());
        let parent = groups.entry(key).or_insert_with(|| ParentAsinFact {
            report_date: fact.report_date,
            parent_asin: fact.parent_asin.clone(),
            product_name: fact.product_name.clone(),
            metrics: DailyMetrics::default(),
            estimated_cogs: Decimal::ZERO,
            estimated_profit: Decimal::ZERO,
            inventory_level: 0,
        });
        if fact.product_name < parent.product_name {
            parent.product_name = fact.product_name.clone();
        }
        parent.metrics.accumulate(&fact.metrics);
        parent.estimated_cogs += fact.estimated_cogs;
        parent.estimated_profit += fact.estimated_profit;
        parent.inventory_level += fact.inventory_level;
    }
    groups.into_values().collect()
}

/// Both statements of the daily ASIN job
pub fn daily_asin_sql(tables: &WarehouseTables) -> String {
    format!("{}\n\n{}", child_asin_sql(tables), parent_asin_sql(tables))
}

fn child_asin_sql(tables: &WarehouseTables) -> String {
    let mut select = vec![
        "t.report_date".to_string(),
        "t.child_asin".to_string(),
        "t.parent_asin".to_string(),
        "COALESCE(p.product_name, '') AS product_name".to_string(),
        "COALESCE(p.amazon_sku, '') AS sku".to_string(),
    ];
    select.extend(
        METRICS
            .iter()
            .map(|m| format!("{} AS {}", m.source_expr(), m.column())),
    );
    select.push("c.standard_cost AS standard_cost_per_unit".to_string());
    select.push("t.units_ordered * COALESCE(c.standard_cost, 0) AS estimated_cogs".to_string());
    select.push(
        "t.ordered_product_sales - t.units_ordered * COALESCE(c.standard_cost, 0) - COALESCE(a.ad_cost, 0) AS estimated_profit"
            .to_string(),
    );
    select.push("COALESCE(inv.inventory_level, 0) AS inventory_level".to_string());
    select.extend(RATIOS.iter().map(|r| {
        format!(
            "{} AS {}",
            safe_ratio(&r.numerator.source_expr(), &r.denominator.source_expr()),
            r.name
        )
    }));

    format!(
        "CREATE OR REPLACE TABLE {fact} AS
WITH
traffic AS (
  SELECT report_date, child_asin, parent_asin,
    units_ordered, ordered_product_sales, total_order_items, sessions, page_views
  FROM {traffic}
),
products AS (
  SELECT asin, amazon_sku, name AS product_name
  FROM {products}
  WHERE asin IS NOT NULL
),
ads AS (
  SELECT report_date, advertised_asin AS child_asin,
    SUM(impressions) AS ad_impressions, SUM(clicks) AS ad_clicks,
    SUM(ad_cost) AS ad_cost, SUM(ad_sales_7d) AS ad_sales,
    SUM(ad_purchases_7d) AS ad_purchases, SUM(ad_units_sold_7d) AS ad_units_sold
  FROM {ads}
  GROUP BY report_date, advertised_asin
),
costs AS (
  {costs}
),
latest_inventory AS (
  SELECT asin, fulfillable_quantity AS inventory_level
  FROM (SELECT asin, fulfillable_quantity, ROW_NUMBER() OVER (PARTITION BY asin ORDER BY fetched_at DESC) AS rn FROM {inventory})
  WHERE rn = 1
)
SELECT
  {select}
FROM traffic t
LEFT JOIN products p ON t.child_asin = p.asin
LEFT JOIN ads a ON t.report_date = a.report_date AND t.child_asin = a.child_asin
LEFT JOIN costs c ON t.child_asin = c.asin AND t.report_date BETWEEN c.effective_start_date AND c.effective_end_date
LEFT JOIN latest_inventory inv ON t.child_asin = inv.asin;",
        fact = tables.analytics("fact_daily_asin"),
        traffic = tables.analytics("stg_sp_traffic_child_asin"),
        products = tables.product_master(),
        ads = tables.analytics("stg_ads_product_daily"),
        costs = validity_window_sql("asin", &tables.analytics("stg_cost_standard")),
        inventory = tables.analytics("stg_sp_inventory"),
        select = select.join(",\n  "),
    )
}

fn parent_asin_sql(tables: &WarehouseTables) -> String {
    let mut select = vec![
        "report_date".to_string(),
        "parent_asin".to_string(),
        "MIN(product_name) AS product_name".to_string(),
    ];
    select.extend(
        METRICS
            .iter()
            .map(|m| format!("SUM({c}) AS {c}", c = m.column())),
    );
    for column in ["estimated_cogs", "estimated_profit", "inventory_level"] {
        select.push(format!("SUM({c}) AS {c}", c = column));
    }
    select.extend(RATIOS.iter().map(|r| {
        format!(
            "{} AS {}",
            safe_ratio(
                &format!("SUM({})", r.numerator.column()),
                &format!("SUM({})", r.denominator.column())
            ),
            r.name
        )
    }));

    format!(
        "CREATE OR REPLACE TABLE {parent} AS
SELECT
  {select}
FROM {fact}
GROUP BY report_date, parent_asin;",
        parent = tables.analytics("fact_daily_parent_asin"),
        fact = tables.analytics("fact_daily_asin"),
        select = select.join(",\n  "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::cost_interval::CostRecord;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn traffic(child: &str, parent: &str, units: i64, sales: Decimal, sessions: i64) -> DailyTraffic {
        DailyTraffic {
            report_date: date("2024-03-10"),
            child_asin: child.to_string(),
            parent_asin: parent.to_string(),
            units_ordered: units,
            ordered_product_sales: sales,
            total_order_items: units,
            sessions,
            page_views: sessions * 2,
        }
    }

    fn ads(clicks: i64, cost: Decimal, sales: Decimal, units: i64) -> AdTotals {
        AdTotals {
            impressions: clicks * 40,
            clicks,
            cost,
            sales,
            purchases: units,
            units_sold: units,
        }
    }

    #[test]
    fn test_organic_metrics_subtract_ad_attribution() {
        let t = traffic("B0CHILD1", "B0PARENT", 10, dec!(20000), 200);
        let m = DailyMetrics::from_sources(&t, Some(&ads(50, dec!(3000), dec!(8000), 4)));
        assert_eq!(m.organic_sessions, 150);
        assert_eq!(m.organic_units, 6);
        assert_eq!(m.organic_sales, dec!(12000));
    }

    #[test]
    fn test_organic_metrics_never_negative() {
        // ad attribution window reports more than the traffic report
        let t = traffic("B0CHILD1", "B0PARENT", 2, dec!(4000), 10);
        let m = DailyMetrics::from_sources(&t, Some(&ads(25, dec!(900), dec!(9000), 5)));
        assert_eq!(m.organic_units, 0);
        assert_eq!(m.organic_sessions, 0);
        assert_eq!(m.organic_sales, Decimal::ZERO);
    }

    #[test]
    fn test_organic_units_property_over_grid() {
        for units in 0..6 {
            for ad_units in 0..6 {
                let t = traffic("B0C", "B0P", units, dec!(0), 0);
                let m = DailyMetrics::from_sources(&t, Some(&ads(0, dec!(0), dec!(0), ad_units)));
                assert_eq!(m.organic_units, (units - ad_units).max(0));
                assert!(m.organic_units >= 0);
            }
        }
    }

    #[test]
    fn test_ratios_are_null_safe() {
        // no ads at all: every ad-based denominator is zero
        let t = traffic("B0CHILD1", "B0PARENT", 0, dec!(0), 0);
        let m = DailyMetrics::from_sources(&t, None);
        for (name, value) in m.ratios() {
            assert_eq!(value, None, "{} should be null", name);
        }
    }

    #[test]
    fn test_ratio_values() {
        let t = traffic("B0CHILD1", "B0PARENT", 10, dec!(20000), 200);
        let m = DailyMetrics::from_sources(&t, Some(&ads(50, dec!(3000), dec!(8000), 4)));
        assert_eq!(m.ratio("tacos"), Some(dec!(0.15)));
        assert_eq!(m.ratio("acos"), Some(dec!(0.375)));
        assert_eq!(m.ratio("total_cvr"), Some(dec!(0.05)));
        assert_eq!(m.ratio("ad_cvr"), Some(dec!(0.08)));
        assert_eq!(m.ratio("organic_cvr"), Some(dec!(0.04)));
        assert_eq!(m.ratio("cpc"), Some(dec!(60)));
        assert_eq!(m.ratio("unknown"), None);
    }

    #[test]
    fn test_fact_cost_and_profit() {
        let t = traffic("B0CHILD1", "B0PARENT", 10, dec!(20000), 200);
        let product = ProductInfo {
            asin: "B0CHILD1".to_string(),
            amazon_sku: "ITEM-A".to_string(),
            name: "Item A".to_string(),
        };
        let fact = DailyAsinFact::compute(
            &t,
            Some(&product),
            Some(&ads(50, dec!(3000), dec!(8000), 4)),
            Some(dec!(1200)),
            Some(80),
        );
        assert_eq!(fact.sku, "ITEM-A");
        assert_eq!(fact.estimated_cogs, dec!(12000));
        assert_eq!(fact.estimated_profit, dec!(5000));
        assert_eq!(fact.inventory_level, 80);

        // unknown product, no cost, no inventory
        let bare = DailyAsinFact::compute(&t, None, None, None, None);
        assert_eq!(bare.product_name, "");
        assert_eq!(bare.sku, "");
        assert_eq!(bare.standard_cost_per_unit, None);
        assert_eq!(bare.estimated_cogs, Decimal::ZERO);
        assert_eq!(bare.estimated_profit, dec!(20000));
        assert_eq!(bare.inventory_level, 0);
    }

    #[test]
    fn test_build_daily_facts_joins_all_sources() {
        let traffic_rows = vec![traffic("B0CHILD1", "B0PARENT", 10, dec!(20000), 200)];
        let products = vec![ProductInfo {
            asin: "B0CHILD1".to_string(),
            amazon_sku: "ITEM-A".to_string(),
            name: "Item A".to_string(),
        }];
        let ad_rows = vec![
            AdProductRow {
                report_date: date("2024-03-10"),
                advertised_asin: "B0CHILD1".to_string(),
                impressions: 1000,
                clicks: 30,
                ad_cost: dec!(2000),
                ad_sales_7d: dec!(5000),
                ad_purchases_7d: 2,
                ad_units_sold_7d: 3,
            },
            AdProductRow {
                report_date: date("2024-03-10"),
                advertised_asin: "B0CHILD1".to_string(),
                impressions: 500,
                clicks: 20,
                ad_cost: dec!(1000),
                ad_sales_7d: dec!(3000),
                ad_purchases_7d: 1,
                ad_units_sold_7d: 1,
            },
        ];
        let costs = CostSchedule::build(vec![
            CostRecord {
                key: "B0CHILD1".to_string(),
                standard_cost: dec!(1000),
                effective_start_date: date("2024-01-01"),
            },
            CostRecord {
                key: "B0CHILD1".to_string(),
                standard_cost: dec!(1200),
                effective_start_date: date("2024-03-01"),
            },
        ]);
        let snapshots = vec![
            InventorySnapshot {
                asin: "B0CHILD1".to_string(),
                fulfillable_quantity: 95,
                fetched_at: chrono::DateTime::from_timestamp(1_709_000_000, 0).unwrap(),
            },
            InventorySnapshot {
                asin: "B0CHILD1".to_string(),
                fulfillable_quantity: 80,
                fetched_at: chrono::DateTime::from_timestamp(1_710_000_000, 0).unwrap(),
            },
        ];

        let facts = build_daily_facts(&traffic_rows, &products, &ad_rows, &costs, &snapshots);
        assert_eq!(facts.len(), 1);
        let f = &facts[0];
        assert_eq!(f.metrics.ad_clicks, 50);
        assert_eq!(f.metrics.ad_cost, dec!(3000));
        assert_eq!(f.metrics.ad_units_sold, 4);
        assert_eq!(f.standard_cost_per_unit, Some(dec!(1200)));
        assert_eq!(f.inventory_level, 80);
    }

    #[test]
    fn test_parent_rollup_recomputes_ratios_from_sums() {
        let a = DailyAsinFact::compute(
            &traffic("B0CHILD1", "B0PARENT", 10, dec!(20000), 200),
            None,
            Some(&ads(50, dec!(3000), dec!(8000), 4)),
            Some(dec!(1000)),
            Some(10),
        );
        let b = DailyAsinFact::compute(
            &traffic("B0CHILD2", "B0PARENT", 0, dec!(0), 100),
            None,
            None,
            None,
            Some(5),
        );
        let parents = rollup_parents(&[a, b]);
        assert_eq!(parents.len(), 1);
        let p = &parents[0];
        assert_eq!(p.metrics.sessions, 300);
        assert_eq!(p.metrics.organic_sessions, 250);
        assert_eq!(p.inventory_level, 15);
        assert_eq!(p.estimated_cogs, dec!(10000));
        // 10 units over 300 sessions, not the mean of per-child ratios
        assert_eq!(
            p.metrics.ratio("total_cvr"),
            safe_divide(dec!(10), dec!(300))
        );
        assert_eq!(p.metrics.ratio("tacos"), Some(dec!(0.15)));
    }

    #[test]
    fn test_parent_rollup_takes_min_product_name() {
        let mut a = DailyAsinFact::compute(&traffic("B0C1", "B0P", 1, dec!(1), 1), None, None, None, None);
        a.product_name = "Widget Blue".to_string();
        let mut b = DailyAsinFact::compute(&traffic("B0C2", "B0P", 1, dec!(1), 1), None, None, None, None);
        b.product_name = "Widget Amber".to_string();
        let parents = rollup_parents(&[a, b]);
        assert_eq!(parents[0].product_name, "Widget Amber");
    }

    #[test]
    fn test_sql_uses_shared_definitions() {
        let tables = WarehouseTables::new("shop-123", "analytics", "nocodb");
        let sql = daily_asin_sql(&tables);

        assert!(sql.contains("CREATE OR REPLACE TABLE `shop-123.analytics.fact_daily_asin` AS"));
        assert!(sql.contains("CREATE OR REPLACE TABLE `shop-123.analytics.fact_daily_parent_asin` AS"));
        assert!(sql.contains("FROM `shop-123.nocodb.product_master`"));
        assert!(sql.contains(
            "GREATEST(t.units_ordered - COALESCE(a.ad_units_sold, 0), 0) AS organic_units"
        ));
        assert!(sql.contains(
            "SAFE_DIVIDE(COALESCE(a.ad_cost, 0), NULLIF(COALESCE(a.ad_clicks, 0), 0)) AS cpc"
        ));
        assert!(sql.contains(
            "SAFE_DIVIDE(GREATEST(t.units_ordered - COALESCE(a.ad_units_sold, 0), 0), NULLIF(GREATEST(t.sessions - COALESCE(a.ad_clicks, 0), 0), 0)) AS organic_cvr"
        ));
        assert!(sql.contains("SAFE_DIVIDE(SUM(organic_units), NULLIF(SUM(organic_sessions), 0)) AS organic_cvr"));
        assert!(sql.contains("t.report_date BETWEEN c.effective_start_date AND c.effective_end_date"));
        assert!(sql.contains("GROUP BY report_date, parent_asin;"));
        for ratio in RATIOS {
            assert_eq!(sql.matches(&format!(" AS {},", ratio.name)).count()
                + sql.matches(&format!(" AS {}\n", ratio.name)).count(), 2, "{}", ratio.name);
        }
    }
}
