//! Design workbook with sample data
//!
//! One sheet per ledger/report table, header row first. Derived rows
//! (landed cost totals, the P&L waterfall) are computed from their inputs.

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Number(d)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(Decimal::from(n))
    }
}

/// A row type that maps onto one sheet
pub trait SheetRow {
    const SHEET: &'static str;
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<CellValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerCategory {
    Deposit,
    Payment,
    Fee,
}

impl LedgerCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerCategory::Deposit => "DEPOSIT",
            LedgerCategory::Payment => "PAYMENT",
            LedgerCategory::Fee => "FEE",
        }
    }
}

/// Agency wallet movement in CNY
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: &'static str,
    pub date: &'static str,
    pub category: LedgerCategory,
    pub description: &'static str,
    pub expense_cny: Decimal,
    pub income_cny: Decimal,
    pub po_number: &'static str,
    pub rate_snapshot: Decimal,
}

impl SheetRow for LedgerEntry {
    const SHEET: &'static str = "input_agency_ledger";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "date",
        "category",
        "description",
        "expense_cny",
        "income_cny",
        "po_number",
        "rate_snapshot",
    ];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.id.into(),
            self.date.into(),
            self.category.as_str().into(),
            self.description.into(),
            self.expense_cny.into(),
            self.income_cny.into(),
            self.po_number.into(),
            self.rate_snapshot.into(),
        ]
    }
}

/// JPY sent to the agency and CNY received; not written to the workbook
#[derive(Debug, Clone)]
pub struct DepositRecord {
    pub date: &'static str,
    pub sent_jpy: Decimal,
    pub received_cny: Decimal,
    pub real_rate: Decimal,
}

impl DepositRecord {
    /// JPY per CNY implied by the amounts
    pub fn implied_rate(&self) -> Option<Decimal> {
        crate::transforms::safe_divide(self.sent_jpy, self.received_cny)
    }
}

#[derive(Debug, Clone)]
pub struct PoLine {
    pub po_number: &'static str,
    pub sku: &'static str,
    pub qty: i64,
    pub unit_cny: Decimal,
}

impl SheetRow for PoLine {
    const SHEET: &'static str = "input_po_details";
    const HEADERS: &'static [&'static str] = &["po_number", "sku", "qty", "unit_cny"];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.po_number.into(),
            self.sku.into(),
            self.qty.into(),
            self.unit_cny.into(),
        ]
    }
}

/// Duties and other costs paid outside the agency
#[derive(Debug, Clone)]
pub struct ExternalPayment {
    pub date: &'static str,
    pub category: &'static str,
    pub amount_jpy: Decimal,
    pub link_key: &'static str,
}

impl SheetRow for ExternalPayment {
    const SHEET: &'static str = "input_external_payments";
    const HEADERS: &'static [&'static str] = &["date", "category", "amount_jpy", "link_key"];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.date.into(),
            self.category.into(),
            self.amount_jpy.into(),
            self.link_key.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SettlementEntry {
    pub posted_date: &'static str,
    pub order_id: &'static str,
    pub sku: &'static str,
    pub amount_type: &'static str,
    pub amount: Decimal,
}

impl SheetRow for SettlementEntry {
    const SHEET: &'static str = "input_amazon_settlements";
    const HEADERS: &'static [&'static str] =
        &["posted_date", "order_id", "sku", "amount_type", "amount"];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.posted_date.into(),
            self.order_id.into(),
            self.sku.into(),
            self.amount_type.into(),
            self.amount.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct FbaSnapshot {
    pub snapshot_date: &'static str,
    pub sku: &'static str,
    pub qty: i64,
    pub location: &'static str,
}

impl SheetRow for FbaSnapshot {
    const SHEET: &'static str = "input_fba_inventory";
    const HEADERS: &'static [&'static str] = &["snapshot_date", "sku", "qty", "location"];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.snapshot_date.into(),
            self.sku.into(),
            self.qty.into(),
            self.location.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct LandedCost {
    pub po_number: &'static str,
    pub sku: &'static str,
    pub qty: i64,
    pub landed_cost_unit_jpy: Decimal,
    pub total_cost_jpy: Decimal,
}

impl LandedCost {
    pub fn new(po_number: &'static str, sku: &'static str, qty: i64, landed_cost_unit_jpy: Decimal) -> Self {
        Self {
            po_number,
            sku,
            qty,
            landed_cost_unit_jpy,
            total_cost_jpy: Decimal::from(qty) * landed_cost_unit_jpy,
        }
    }
}

impl SheetRow for LandedCost {
    const SHEET: &'static str = "view_landed_cost";
    const HEADERS: &'static [&'static str] = &[
        "po_number",
        "sku",
        "qty",
        "landed_cost_unit_jpy",
        "total_cost_jpy",
    ];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.po_number.into(),
            self.sku.into(),
            self.qty.into(),
            self.landed_cost_unit_jpy.into(),
            self.total_cost_jpy.into(),
        ]
    }
}

/// Five-stage management P&L row
#[derive(Debug, Clone)]
pub struct PnlRow {
    pub month: &'static str,
    pub sku: &'static str,
    pub sales: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub amz_fees: Decimal,
    pub net_gross: Decimal,
    pub ads: Decimal,
    pub sales_profit: Decimal,
}

impl PnlRow {
    pub fn new(
        month: &'static str,
        sku: &'static str,
        sales: Decimal,
        cogs: Decimal,
        amz_fees: Decimal,
        ads: Decimal,
    ) -> Self {
        let gross_profit = sales - cogs;
        let net_gross = gross_profit - amz_fees;
        Self {
            month,
            sku,
            sales,
            cogs,
            gross_profit,
            amz_fees,
            net_gross,
            ads,
            sales_profit: net_gross - ads,
        }
    }
}

impl SheetRow for PnlRow {
    const SHEET: &'static str = "rpt_pnl_5stage";
    const HEADERS: &'static [&'static str] = &[
        "month",
        "sku",
        "sales",
        "cogs",
        "gross_profit",
        "amz_fees",
        "net_gross",
        "ads",
        "sales_profit",
    ];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.month.into(),
            self.sku.into(),
            self.sales.into(),
            self.cogs.into(),
            self.gross_profit.into(),
            self.amz_fees.into(),
            self.net_gross.into(),
            self.ads.into(),
            self.sales_profit.into(),
        ]
    }
}

/// Sheet name, header row and data rows, ready to write
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    fn of<R: SheetRow>(rows: &[R]) -> Self {
        Self {
            name: R::SHEET,
            headers: R::HEADERS,
            rows: rows.iter().map(R::cells).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleData {
    pub ledger: Vec<LedgerEntry>,
    pub deposits: Vec<DepositRecord>,
    pub po_lines: Vec<PoLine>,
    pub external_payments: Vec<ExternalPayment>,
    pub fba_inventory: Vec<FbaSnapshot>,
    pub settlements: Vec<SettlementEntry>,
    pub landed_costs: Vec<LandedCost>,
    pub pnl: Vec<PnlRow>,
}

impl SampleData {
    /// The fixed sample rows of the design document
    pub fn design_document() -> Self {
        Self {
            ledger: vec![
                LedgerEntry {
                    id: "L001",
                    date: "2024-01-01",
                    category: LedgerCategory::Deposit,
                    description: "Initial Deposit",
                    expense_cny: Decimal::ZERO,
                    income_cny: Decimal::from(50000),
                    po_number: "",
                    rate_snapshot: Decimal::ZERO,
                },
                LedgerEntry {
                    id: "L002",
                    date: "2024-01-05",
                    category: LedgerCategory::Payment,
                    description: "Payment for PO-001",
                    expense_cny: Decimal::from(10000),
                    income_cny: Decimal::ZERO,
                    po_number: "PO-001",
                    rate_snapshot: Decimal::new(205, 1),
                },
                LedgerEntry {
                    id: "L003",
                    date: "2024-01-10",
                    category: LedgerCategory::Fee,
                    description: "Monthly Storage",
                    expense_cny: Decimal::from(500),
                    income_cny: Decimal::ZERO,
                    po_number: "",
                    rate_snapshot: Decimal::new(206, 1),
                },
            ],
            deposits: vec![DepositRecord {
                date: "2024-01-01",
                sent_jpy: Decimal::from(1_025_000),
                received_cny: Decimal::from(50000),
                real_rate: Decimal::new(205, 1),
            }],
            po_lines: vec![
                PoLine {
                    po_number: "PO-001",
                    sku: "ITEM-A",
                    qty: 100,
                    unit_cny: Decimal::from(50),
                },
                PoLine {
                    po_number: "PO-001",
                    sku: "ITEM-B",
                    qty: 200,
                    unit_cny: Decimal::from(25),
                },
            ],
            external_payments: vec![ExternalPayment {
                date: "2024-01-15",
                category: "DUTY",
                amount_jpy: Decimal::from(15000),
                link_key: "PO-001",
            }],
            fba_inventory: vec![
                FbaSnapshot {
                    snapshot_date: "2024-01-31",
                    sku: "ITEM-A",
                    qty: 80,
                    location: "FBA-JP",
                },
                FbaSnapshot {
                    snapshot_date: "2024-01-31",
                    sku: "ITEM-B",
                    qty: 190,
                    location: "FBA-JP",
                },
            ],
            settlements: vec![
                SettlementEntry {
                    posted_date: "2024-01-20",
                    order_id: "111-222",
                    sku: "ITEM-A",
                    amount_type: "ItemPrice",
                    amount: Decimal::from(2000),
                },
                SettlementEntry {
                    posted_date: "2024-01-20",
                    order_id: "111-222",
                    sku: "ITEM-A",
                    amount_type: "FBA Fee",
                    amount: Decimal::from(-500),
                },
                SettlementEntry {
                    posted_date: "2024-01-20",
                    order_id: "111-222",
                    sku: "ITEM-A",
                    amount_type: "Commission",
                    amount: Decimal::from(-200),
                },
            ],
            landed_costs: vec![
                LandedCost::new("PO-001", "ITEM-A", 100, Decimal::from(1200)),
                LandedCost::new("PO-001", "ITEM-B", 200, Decimal::from(600)),
            ],
            pnl: vec![PnlRow::new(
                "2024-01",
                "ITEM-A",
                Decimal::from(40000),
                Decimal::from(24000),
                Decimal::from(10000),
                Decimal::from(2000),
            )],
        }
    }

    /// Ledger DEPOSIT rows, the source of the exchange-rate history
    pub fn deposit_entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.ledger
            .iter()
            .filter(|e| e.category == LedgerCategory::Deposit)
    }

    /// Sheets in write order; the deposit log is not among them
    pub fn sheets(&self) -> Vec<Sheet> {
        vec![
            Sheet::of(&self.ledger),
            Sheet::of(&self.po_lines),
            Sheet::of(&self.external_payments),
            Sheet::of(&self.settlements),
            Sheet::of(&self.fba_inventory),
            Sheet::of(&self.landed_costs),
            Sheet::of(&self.pnl),
        ]
    }
}

/// Write the sheets to `path`, creating parent directories.
pub fn write_workbook(sheets: &[Sheet], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut workbook = Workbook::new();
    for sheet in sheets {
        debug!("Writing sheet {} ({} rows)", sheet.name, sheet.rows.len());
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }
        for (i, row) in sheet.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    CellValue::Text(s) => {
                        worksheet.write_string(r, col as u16, s)?;
                    }
                    CellValue::Number(d) => {
                        worksheet.write_number(r, col as u16, d.to_f64().unwrap_or_default())?;
                    }
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to write workbook {}", path.display()))?;
    info!("Wrote {} sheets to {}", sheets.len(), path.display());
    Ok(())
}

/// Export the sample design workbook, returning the sheet names written
pub fn export_design_workbook(path: &Path) -> Result<Vec<&'static str>> {
    let sheets = SampleData::design_document().sheets();
    write_workbook(&sheets, path)?;
    Ok(sheets.iter().map(|s| s.name).collect())
}
