//! SQL building blocks shared by the transformation jobs

use crate::config::Config;

/// Fully-qualified table names for one project
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseTables {
    pub project_id: String,
    pub analytics: String,
    pub product_master: String,
}

impl WarehouseTables {
    pub fn new(
        project_id: impl Into<String>,
        analytics: impl Into<String>,
        product_master: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            analytics: analytics.into(),
            product_master: product_master.into(),
        }
    }

    pub fn from_config(config: &Config, project_id: &str) -> Self {
        Self::new(
            project_id,
            config.datasets.analytics.clone(),
            config.datasets.product_master.clone(),
        )
    }

    /// `` `project.analytics.table` ``
    pub fn analytics(&self, table: &str) -> String {
        format!("`{}.{}.{}`", self.project_id, self.analytics, table)
    }

    /// `` `project.product_master.product_master` ``
    pub fn product_master(&self) -> String {
        format!("`{}.{}.product_master`", self.project_id, self.product_master)
    }
}

/// Ratio that is NULL when the denominator is zero or NULL
pub fn safe_ratio(numerator: &str, denominator: &str) -> String {
    format!("SAFE_DIVIDE({}, NULLIF({}, 0))", numerator, denominator)
}

/// Difference floored at zero
pub fn floored_difference(total: &str, part: &str) -> String {
    format!("GREATEST({} - {}, 0)", total, part)
}

pub fn zero_if_null(expr: &str) -> String {
    format!("COALESCE({}, 0)", expr)
}

/// Quote a string literal for standard SQL
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
