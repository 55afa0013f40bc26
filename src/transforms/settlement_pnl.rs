//! Monthly settlement P&L per SKU
//!
//! Settlement lines are classified into buckets by [`RULES`], summed per
//! (month, SKU), joined with the month's allocated ad cost and standard cost,
//! and run through the profit waterfall. Fees, points and promotions arrive
//! signed (negative) from the settlement report and are added as-is.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use super::cost_interval::{validity_window_sql, CostSchedule};
use super::daily_asin::ProductInfo;
use super::sql::{string_literal, WarehouseTables};
use crate::period::YearMonth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Sales,
    Tax,
    AmazonFees,
    PointsGranted,
    Promotions,
    RefundTotal,
}

impl Bucket {
    pub fn column(self) -> &'static str {
        match self {
            Bucket::Sales => "settlement_sales",
            Bucket::Tax => "settlement_tax",
            Bucket::AmazonFees => "amazon_fees",
            Bucket::PointsGranted => "points_granted",
            Bucket::Promotions => "promotions",
            Bucket::RefundTotal => "refund_total",
        }
    }
}

/// A classification rule; `None` fields match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub bucket: Bucket,
    pub transaction_type: &'static str,
    pub amount_type: Option<&'static str>,
    pub amount_description: Option<&'static str>,
}

pub const RULES: [Rule; 6] = [
    Rule {
        bucket: Bucket::Sales,
        transaction_type: "Order",
        amount_type: Some("ItemPrice"),
        amount_description: Some("Principal"),
    },
    Rule {
        bucket: Bucket::Tax,
        transaction_type: "Order",
        amount_type: Some("ItemPrice"),
        amount_description: Some("Tax"),
    },
    Rule {
        bucket: Bucket::AmazonFees,
        transaction_type: "Order",
        amount_type: Some("ItemFees"),
        amount_description: None,
    },
    Rule {
        bucket: Bucket::PointsGranted,
        transaction_type: "Order",
        amount_type: Some("Points"),
        amount_description: None,
    },
    Rule {
        bucket: Bucket::Promotions,
        transaction_type: "Order",
        amount_type: Some("Promotion"),
        amount_description: None,
    },
    Rule {
        bucket: Bucket::RefundTotal,
        transaction_type: "Refund",
        amount_type: None,
        amount_description: None,
    },
];

/// Quantity counts only lines of this bucket
pub const QUANTITY_BUCKET: Bucket = Bucket::Sales;

impl Rule {
    pub fn matches(&self, line: &SettlementLine) -> bool {
        line.transaction_type == self.transaction_type
            && self.amount_type.map_or(true, |t| line.amount_type == t)
            && self
                .amount_description
                .map_or(true, |d| line.amount_description == d)
    }

    fn sql_condition(&self) -> String {
        let mut parts = vec![format!(
            "transaction_type={}",
            string_literal(self.transaction_type)
        )];
        if let Some(t) = self.amount_type {
            parts.push(format!("amount_type={}", string_literal(t)));
        }
        if let Some(d) = self.amount_description {
            parts.push(format!("amount_description={}", string_literal(d)));
        }
        parts.join(" AND ")
    }
}

pub fn classify(line: &SettlementLine) -> Option<Bucket> {
    RULES.iter().find(|r| r.matches(line)).map(|r| r.bucket)
}

fn rule_for(bucket: Bucket) -> Option<Rule> {
    RULES.iter().copied().find(|r| r.bucket == bucket)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementLine {
    pub posted_date: Option<NaiveDate>,
    pub sku: Option<String>,
    pub transaction_type: String,
    pub amount_type: String,
    pub amount_description: String,
    pub amount: Decimal,
    pub quantity_purchased: i64,
}

/// Settlement totals for one (month, SKU)
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementMonth {
    pub year_month: YearMonth,
    pub sku: String,
    pub sales: Decimal,
    pub tax: Decimal,
    pub amazon_fees: Decimal,
    pub points_granted: Decimal,
    pub promotions: Decimal,
    pub refund_total: Decimal,
    pub qty: i64,
}

impl SettlementMonth {
    pub fn new(year_month: YearMonth, sku: impl Into<String>) -> Self {
        Self {
            year_month,
            sku: sku.into(),
            sales: Decimal::ZERO,
            tax: Decimal::ZERO,
            amazon_fees: Decimal::ZERO,
            points_granted: Decimal::ZERO,
            promotions: Decimal::ZERO,
            refund_total: Decimal::ZERO,
            qty: 0,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Decimal {
        match bucket {
            Bucket::Sales => &mut self.sales,
            Bucket::Tax => &mut self.tax,
            Bucket::AmazonFees => &mut self.amazon_fees,
            Bucket::PointsGranted => &mut self.points_granted,
            Bucket::Promotions => &mut self.promotions,
            Bucket::RefundTotal => &mut self.refund_total,
        }
    }

    pub fn add(&mut self, line: &SettlementLine) {
        if let Some(bucket) = classify(line) {
            *self.bucket_mut(bucket) += line.amount;
            if bucket == QUANTITY_BUCKET {
                self.qty += line.quantity_purchased;
            }
        }
    }

    /// Rows with neither quantity nor sales are dropped from the report
    pub fn has_activity(&self) -> bool {
        self.qty > 0 || !self.sales.is_zero()
    }
}

/// Sum lines per (month, SKU); lines without SKU or posted date are skipped.
pub fn aggregate_settlements(lines: &[SettlementLine]) -> BTreeMap<(YearMonth, String), SettlementMonth> {
    let mut months: BTreeMap<(YearMonth, String), SettlementMonth> = BTreeMap::new();
    for line in lines {
        let (Some(date), Some(sku)) = (line.posted_date, line.sku.as_ref()) else {
            continue;
        };
        let ym = YearMonth::of(date);
        months
            .entry((ym, sku.clone()))
            .or_insert_with(|| SettlementMonth::new(ym, sku.clone()))
            .add(line);
    }
    months
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdCostRow {
    pub report_date: NaiveDate,
    pub advertised_asin: String,
    pub advertised_sku: Option<String>,
    pub ad_cost: Decimal,
}

/// Ad cost per (month, SKU). The SKU comes from the product master by ASIN,
/// falling back to the advertised SKU.
pub fn allocate_ad_cost(
    rows: &[AdCostRow],
    products: &[ProductInfo],
) -> HashMap<(YearMonth, String), Decimal> {
    let sku_by_asin: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.asin.as_str(), p.amazon_sku.as_str()))
        .collect();

    let mut allocated: HashMap<(YearMonth, String), Decimal> = HashMap::new();
    for row in rows {
        let sku = sku_by_asin
            .get(row.advertised_asin.as_str())
            .map(|s| s.to_string())
            .or_else(|| row.advertised_sku.clone());
        let Some(sku) = sku else {
            continue;
        };
        *allocated
            .entry((YearMonth::of(row.report_date), sku))
            .or_default() += row.ad_cost;
    }
    allocated
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitWaterfall {
    pub standard_cogs: Decimal,
    pub gross_profit: Decimal,
    pub gross_profit_after_fees: Decimal,
    pub net_profit: Decimal,
    pub net_profit_after_refund: Decimal,
}

impl ProfitWaterfall {
    pub fn compute(month: &SettlementMonth, standard_cost: Option<Decimal>, ad_cost: Decimal) -> Self {
        let standard_cogs = Decimal::from(month.qty) * standard_cost.unwrap_or(Decimal::ZERO);
        let gross_profit = month.sales - standard_cogs;
        let gross_profit_after_fees = gross_profit + month.amazon_fees;
        let net_profit = gross_profit_after_fees + month.points_granted + month.promotions - ad_cost;
        let net_profit_after_refund = net_profit + month.refund_total;
        Self {
            standard_cogs,
            gross_profit,
            gross_profit_after_fees,
            net_profit,
            net_profit_after_refund,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPnlRow {
    pub settlement: SettlementMonth,
    pub asin: Option<String>,
    pub product_name: Option<String>,
    pub ad_cost_allocated: Decimal,
    pub standard_cost_per_unit: Option<Decimal>,
    pub waterfall: ProfitWaterfall,
}

/// The report, month descending then sales descending. `costs` is keyed by
/// Amazon SKU.
pub fn build_report(
    lines: &[SettlementLine],
    ad_rows: &[AdCostRow],
    products: &[ProductInfo],
    costs: &CostSchedule,
) -> Vec<SettlementPnlRow> {
    let ad_cost = allocate_ad_cost(ad_rows, products);
    let product_by_sku: HashMap<&str, &ProductInfo> = products
        .iter()
        .map(|p| (p.amazon_sku.as_str(), p))
        .collect();

    let mut rows: Vec<SettlementPnlRow> = aggregate_settlements(lines)
        .into_iter()
        .filter(|(_, month)| month.has_activity())
        .map(|((ym, sku), month)| {
            let standard_cost = costs.lookup_month(&sku, ym).map(|i| i.standard_cost);
            let ad = ad_cost.get(&(ym, sku.clone())).copied().unwrap_or_default();
            let product = product_by_sku.get(sku.as_str());
            SettlementPnlRow {
                waterfall: ProfitWaterfall::compute(&month, standard_cost, ad),
                asin: product.map(|p| p.asin.clone()),
                product_name: product.map(|p| p.name.clone()),
                ad_cost_allocated: ad,
                standard_cost_per_unit: standard_cost,
                settlement: month,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.settlement
            .year_month
            .cmp(&a.settlement.year_month)
            .then(b.settlement.sales.cmp(&a.settlement.sales))
            .then(a.settlement.sku.cmp(&b.settlement.sku))
    });
    rows
}

fn bucket_sum_sql(rule: &Rule, value: &str, column: &str) -> String {
    format!(
        "SUM(CASE WHEN {} THEN {} ELSE 0 END) AS {}",
        rule.sql_condition(),
        value,
        column
    )
}

pub fn settlement_pnl_sql(tables: &WarehouseTables) -> String {
    let mut sums: Vec<String> = RULES
        .iter()
        .map(|r| bucket_sum_sql(r, "amount", r.bucket.column()))
        .collect();
    if let Some(rule) = rule_for(QUANTITY_BUCKET) {
        sums.push(bucket_sum_sql(&rule, "quantity_purchased", "settlement_qty"));
    }
    let settlement_columns: Vec<String> = RULES
        .iter()
        .map(|r| format!("sc.{}", r.bucket.column()))
        .chain(std::iter::once("sc.settlement_qty".to_string()))
        .collect();

    let cogs = "sc.settlement_qty * COALESCE(sc.standard_cost, 0)";
    let ad = "COALESCE(ac.ad_cost_allocated, 0)";
    let gross = format!("sc.settlement_sales - {}", cogs);
    let after_fees = format!("{} + sc.amazon_fees", gross);
    let net = format!("{} + sc.points_granted + sc.promotions - {}", after_fees, ad);
    let after_refund = format!("{} + sc.refund_total", net);

    format!(
        "CREATE OR REPLACE TABLE {fact} AS
WITH
settlement_agg AS (
  SELECT FORMAT_DATE('%Y-%m', posted_date) AS year_month, sku,
    {sums}
  FROM {settlement}
  WHERE sku IS NOT NULL AND posted_date IS NOT NULL
  GROUP BY 1, 2
),
ad_cost_monthly AS (
  SELECT FORMAT_DATE('%Y-%m', a.report_date) AS year_month,
    COALESCE(pm.amazon_sku, a.advertised_sku) AS sku,
    SUM(a.ad_cost) AS ad_cost_allocated
  FROM {ads} a
  LEFT JOIN {products} pm ON a.advertised_asin = pm.asin
  GROUP BY 1, 2
),
cost_lookup AS (
  {costs}
),
settlement_with_cost AS (
  SELECT s.*, c.standard_cost
  FROM settlement_agg s
  LEFT JOIN cost_lookup c ON s.sku = c.amazon_sku
    AND c.effective_end_date >= c.effective_start_date
    AND PARSE_DATE('%Y-%m', s.year_month) BETWEEN DATE_TRUNC(c.effective_start_date, MONTH) AND DATE_TRUNC(c.effective_end_date, MONTH)
  WHERE TRUE
  QUALIFY ROW_NUMBER() OVER (PARTITION BY s.year_month, s.sku ORDER BY c.effective_start_date DESC) = 1
)
SELECT
  sc.year_month, sc.sku, pm.asin, pm.name AS product_name,
  {settlement_columns},
  {ad} AS ad_cost_allocated,
  sc.standard_cost AS standard_cost_per_unit,
  {cogs} AS standard_cogs,
  {gross} AS gross_profit,
  {after_fees} AS gross_profit_after_fees,
  {net} AS net_profit,
  {after_refund} AS net_profit_after_refund
FROM settlement_with_cost sc
LEFT JOIN ad_cost_monthly ac ON sc.year_month = ac.year_month AND sc.sku = ac.sku
LEFT JOIN {products} pm ON sc.sku = pm.amazon_sku
WHERE sc.settlement_qty > 0 OR sc.settlement_sales != 0
ORDER BY sc.year_month DESC, sc.settlement_sales DESC;",
        fact = tables.analytics("fact_monthly_settlement_sku"),
        sums = sums.join(",\n    "),
        settlement = tables.analytics("stg_sp_settlement"),
        ads = tables.analytics("stg_ads_product_daily"),
        products = tables.product_master(),
        costs = validity_window_sql("amazon_sku", &tables.analytics("stg_cost_standard")),
        settlement_columns = settlement_columns.join(", "),
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

    fn line(posted: &str, sku: &str, tx: &str, at: &str, desc: &str, amount: Decimal, qty: i64) -> SettlementLine {
        SettlementLine {
            posted_date: Some(date(posted)),
            sku: Some(sku.to_string()),
            transaction_type: tx.to_string(),
            amount_type: at.to_string(),
            amount_description: desc.to_string(),
            amount,
            quantity_purchased: qty,
        }
    }

    fn product(asin: &str, sku: &str, name: &str) -> ProductInfo {
        ProductInfo {
            asin: asin.to_string(),
            amazon_sku: sku.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_classification_rules() {
        let cases = [
            ("Order", "ItemPrice", "Principal", Some(Bucket::Sales)),
            ("Order", "ItemPrice", "Tax", Some(Bucket::Tax)),
            ("Order", "ItemPrice", "Shipping", None),
            ("Order", "ItemFees", "Commission", Some(Bucket::AmazonFees)),
            ("Order", "Points", "PointsGranted", Some(Bucket::PointsGranted)),
            ("Order", "Promotion", "Principal", Some(Bucket::Promotions)),
            ("Refund", "ItemPrice", "Principal", Some(Bucket::RefundTotal)),
            ("Refund", "ItemFees", "Commission", Some(Bucket::RefundTotal)),
            ("other-transaction", "Storage Fee", "", None),
        ];
        for (tx, at, desc, expected) in cases {
            let l = line("2024-03-05", "SKU-A", tx, at, desc, dec!(1), 0);
            assert_eq!(classify(&l), expected, "{}/{}/{}", tx, at, desc);
        }
    }

    #[test]
    fn test_quantity_counts_only_sales_lines() {
        let lines = vec![
            line("2024-03-05", "SKU-A", "Order", "ItemPrice", "Principal", dec!(4000), 2),
            line("2024-03-05", "SKU-A", "Order", "ItemPrice", "Tax", dec!(400), 2),
            line("2024-03-20", "SKU-A", "Refund", "ItemPrice", "Principal", dec!(-2000), 1),
        ];
        let months = aggregate_settlements(&lines);
        let march: YearMonth = "2024-03".parse().unwrap();
        let m = &months[&(march, "SKU-A".to_string())];
        assert_eq!(m.qty, 2);
        assert_eq!(m.sales, dec!(4000));
        assert_eq!(m.tax, dec!(400));
        assert_eq!(m.refund_total, dec!(-2000));
    }

    #[test]
    fn test_lines_without_sku_or_date_are_skipped() {
        let mut no_sku = line("2024-03-05", "SKU-A", "Order", "ItemPrice", "Principal", dec!(100), 1);
        no_sku.sku = None;
        let mut no_date = no_sku.clone();
        no_date.sku = Some("SKU-A".to_string());
        no_date.posted_date = None;
        assert!(aggregate_settlements(&[no_sku, no_date]).is_empty());
    }

    #[test]
    fn test_waterfall_additivity() {
        let mut month = SettlementMonth::new("2024-03".parse().unwrap(), "SKU-A");
        month.sales = dec!(40000);
        month.qty = 20;
        month.amazon_fees = dec!(-6000);
        month.points_granted = dec!(-400);
        month.promotions = dec!(-600);
        month.refund_total = dec!(-2000);

        let w = ProfitWaterfall::compute(&month, Some(dec!(1200)), dec!(3000));
        assert_eq!(w.standard_cogs, dec!(24000));
        assert_eq!(w.gross_profit, dec!(16000));
        assert_eq!(w.gross_profit_after_fees, dec!(10000));
        assert_eq!(w.net_profit, dec!(6000));
        assert_eq!(w.net_profit_after_refund, dec!(4000));
    }

    #[test]
    fn test_ad_cost_allocation_prefers_product_master_sku() {
        let products = vec![product("B0ASIN1", "SKU-A", "Item A")];
        let rows = vec![
            AdCostRow {
                report_date: date("2024-03-01"),
                advertised_asin: "B0ASIN1".to_string(),
                advertised_sku: Some("ADV-SKU".to_string()),
                ad_cost: dec!(1000),
            },
            AdCostRow {
                report_date: date("2024-03-31"),
                advertised_asin: "B0ASIN1".to_string(),
                advertised_sku: None,
                ad_cost: dec!(500),
            },
            AdCostRow {
                report_date: date("2024-03-15"),
                advertised_asin: "B0UNKNOWN".to_string(),
                advertised_sku: Some("SKU-B".to_string()),
                ad_cost: dec!(200),
            },
            AdCostRow {
                report_date: date("2024-04-01"),
                advertised_asin: "B0ASIN1".to_string(),
                advertised_sku: None,
                ad_cost: dec!(50),
            },
        ];
        let allocated = allocate_ad_cost(&rows, &products);
        let march: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(allocated[&(march, "SKU-A".to_string())], dec!(1500));
        assert_eq!(allocated[&(march, "SKU-B".to_string())], dec!(200));
        assert_eq!(allocated[&(march.next(), "SKU-A".to_string())], dec!(50));
        assert!(!allocated.contains_key(&(march, "ADV-SKU".to_string())));
    }

    #[test]
    fn test_report_end_to_end() {
        let products = vec![product("B0ASIN1", "SKU-A", "Item A")];
        let lines = vec![
            line("2024-03-05", "SKU-A", "Order", "ItemPrice", "Principal", dec!(40000), 20),
            line("2024-03-05", "SKU-A", "Order", "ItemFees", "Commission", dec!(-6000), 0),
            line("2024-02-10", "SKU-A", "Order", "ItemPrice", "Principal", dec!(2000), 1),
            line("2024-03-10", "SKU-B", "Order", "ItemPrice", "Principal", dec!(50000), 10),
            // no quantity and no sales: filtered out
            line("2024-03-10", "SKU-C", "Order", "ItemFees", "Commission", dec!(-100), 0),
        ];
        let ads = vec![AdCostRow {
            report_date: date("2024-03-03"),
            advertised_asin: "B0ASIN1".to_string(),
            advertised_sku: None,
            ad_cost: dec!(4000),
        }];
        let costs = CostSchedule::build(vec![
            CostRecord {
                key: "SKU-A".to_string(),
                standard_cost: dec!(1000),
                effective_start_date: date("2024-01-01"),
            },
            // mid-month change: March uses the later cost
            CostRecord {
                key: "SKU-A".to_string(),
                standard_cost: dec!(1200),
                effective_start_date: date("2024-03-15"),
            },
        ]);

        let report = build_report(&lines, &ads, &products, &costs);
        let keys: Vec<(String, String)> = report
            .iter()
            .map(|r| (r.settlement.year_month.to_string(), r.settlement.sku.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-03".to_string(), "SKU-B".to_string()),
                ("2024-03".to_string(), "SKU-A".to_string()),
                ("2024-02".to_string(), "SKU-A".to_string()),
            ]
        );

        let a = &report[1];
        assert_eq!(a.asin.as_deref(), Some("B0ASIN1"));
        assert_eq!(a.standard_cost_per_unit, Some(dec!(1200)));
        assert_eq!(a.ad_cost_allocated, dec!(4000));
        assert_eq!(a.waterfall.standard_cogs, dec!(24000));
        assert_eq!(a.waterfall.gross_profit, dec!(16000));
        assert_eq!(a.waterfall.gross_profit_after_fees, dec!(10000));
        assert_eq!(a.waterfall.net_profit, dec!(6000));

        let feb = &report[2];
        assert_eq!(feb.standard_cost_per_unit, Some(dec!(1000)));

        let b = &report[0];
        assert_eq!(b.product_name, None);
        assert_eq!(b.standard_cost_per_unit, None);
        assert_eq!(b.waterfall.standard_cogs, Decimal::ZERO);
    }

    #[test]
    fn test_sql_generated_from_rules() {
        let sql = settlement_pnl_sql(&WarehouseTables::new("shop-123", "analytics", "nocodb"));
        assert!(sql.starts_with(
            "CREATE OR REPLACE TABLE `shop-123.analytics.fact_monthly_settlement_sku` AS"
        ));
        assert!(sql.contains(
            "SUM(CASE WHEN transaction_type='Order' AND amount_type='ItemPrice' AND amount_description='Principal' THEN amount ELSE 0 END) AS settlement_sales"
        ));
        assert!(sql.contains(
            "SUM(CASE WHEN transaction_type='Order' AND amount_type='ItemFees' THEN amount ELSE 0 END) AS amazon_fees"
        ));
        assert!(sql.contains(
            "SUM(CASE WHEN transaction_type='Refund' THEN amount ELSE 0 END) AS refund_total"
        ));
        assert!(sql.contains(
            "SUM(CASE WHEN transaction_type='Order' AND amount_type='ItemPrice' AND amount_description='Principal' THEN quantity_purchased ELSE 0 END) AS settlement_qty"
        ));
        assert!(sql.contains(
            "QUALIFY ROW_NUMBER() OVER (PARTITION BY s.year_month, s.sku ORDER BY c.effective_start_date DESC) = 1"
        ));
        assert!(sql.contains("PARTITION BY amazon_sku ORDER BY effective_start_date"));
        assert!(sql.contains("WHERE sc.settlement_qty > 0 OR sc.settlement_sales != 0"));
        assert!(sql.contains("ORDER BY sc.year_month DESC, sc.settlement_sales DESC;"));
        assert!(sql.contains(
            "sc.settlement_sales - sc.settlement_qty * COALESCE(sc.standard_cost, 0) + sc.amazon_fees + sc.points_granted + sc.promotions - COALESCE(ac.ad_cost_allocated, 0) + sc.refund_total AS net_profit_after_refund"
        ));
    }
}
