//! The order-data preprocessing job.
//!
//! Loads the raw orders, order-product links and products, then writes
//! cleaned orders, the joined order-product table and per-user metrics.
//! Any read or parse failure aborts the run; outputs written before the
//! failure stay on disk.

use csv::StringRecord;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PreprocessConfig;
use crate::error::{PipelineError, Result};
use crate::file_writer::{ensure_dir, write_table, CsvTableWriter};
use crate::logging::OperationTimer;
use crate::rfm::{compute_user_rfm, to_table};
use crate::table::{JoinIndex, Table};

/// Raw orders file name.
pub const ORDERS_FILE: &str = "orders.csv";
/// Raw order-product link file name.
pub const ORDER_PRODUCTS_FILE: &str = "order_products__prior.csv";
/// Raw products file name.
pub const PRODUCTS_FILE: &str = "products.csv";

/// Cleaned orders output.
pub const ORDERS_CLEANED_FILE: &str = "orders_cleaned.csv";
/// Joined order-product output.
pub const JOINED_FILE: &str = "joined_order_products.csv";
/// Per-user metrics output.
pub const RFM_FILE: &str = "user_rfm_metrics.csv";

/// What a completed run wrote.
#[derive(Debug, Clone)]
pub struct PreprocessSummary {
    /// Path of `orders_cleaned.csv`
    pub orders_cleaned: PathBuf,
    /// Path of `joined_order_products.csv`
    pub joined_order_products: PathBuf,
    /// Path of `user_rfm_metrics.csv`
    pub user_rfm_metrics: PathBuf,
    /// Rows in the joined table
    pub joined_rows: usize,
    /// Users in the metrics table
    pub users: usize,
}

/// Runs the preprocessing steps against one raw/processed directory pair.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor reading from `config.raw_dir` and writing to `config.processed_dir`.
    pub const fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run every step in order, writing each output as soon as it is ready.
    pub fn run(&self) -> Result<PreprocessSummary> {
        let processed = &self.config.processed_dir;
        ensure_dir(processed).map_err(|e| PipelineError::io(processed, e))?;

        let timer = OperationTimer::new("load_raw_tables");
        let orders = Table::read_csv("orders", &self.config.raw_dir.join(ORDERS_FILE))?;
        let order_products = Table::read_csv("order_products__prior", &self.config.raw_dir.join(ORDER_PRODUCTS_FILE))?;
        let products = Table::read_csv("products", &self.config.raw_dir.join(PRODUCTS_FILE))?;
        timer.finish();
        info!(
            "Loaded {} orders, {} order-product rows, {} products",
            orders.len(),
            order_products.len(),
            products.len()
        );

        let orders_cleaned_path = processed.join(ORDERS_CLEANED_FILE);
        let cleaned_rows = write_cleaned_orders(&orders, &orders_cleaned_path)?;
        info!("Wrote {} ({} rows)", orders_cleaned_path.display(), cleaned_rows);

        let timer = OperationTimer::new("join_order_products");
        let joined_path = processed.join(JOINED_FILE);
        let joined_rows = write_joined_order_products(&order_products, &products, &orders, &joined_path)?;
        timer.finish();
        info!("Wrote {} ({} rows)", joined_path.display(), joined_rows);

        let timer = OperationTimer::new("user_rfm_metrics");
        let metrics = compute_user_rfm(&orders, &order_products)?;
        let rfm_path = processed.join(RFM_FILE);
        write_table(&to_table(&metrics), &rfm_path)?;
        timer.finish();

        info!(
            joined_rows,
            users = metrics.len(),
            "Processed datasets saved to '{}'",
            processed.display()
        );

        Ok(PreprocessSummary {
            orders_cleaned: orders_cleaned_path,
            joined_order_products: joined_path,
            user_rfm_metrics: rfm_path,
            joined_rows,
            users: metrics.len(),
        })
    }
}

/// Write orders with missing `days_since_prior_order` set to `0`; all other cells unchanged.
///
/// Returns the number of rows written.
pub fn write_cleaned_orders(orders: &Table, path: &Path) -> Result<usize> {
    let mut writer = CsvTableWriter::create(path, &orders.headers)?;
    for row in orders.filled_rows("days_since_prior_order", "0")? {
        writer.write_row(&row)?;
    }
    writer.finish()
}

/// Write links left-joined with products on `product_id`, then with orders on `order_id`.
///
/// Every link row is kept; unmatched product or order columns are left
/// empty. Rows go straight to the file, so the joined table never exists in
/// memory. Returns the number of rows written.
pub fn write_joined_order_products(
    order_products: &Table,
    products: &Table,
    orders: &Table,
    path: &Path,
) -> Result<usize> {
    let by_product = JoinIndex::new(&order_products.name, &order_products.headers, products, "product_id")?;
    let by_order = JoinIndex::new(&order_products.name, by_product.headers(), orders, "order_id")?;

    let mut writer = CsvTableWriter::create(path, by_order.headers())?;
    let mut with_product = StringRecord::new();
    let mut out = StringRecord::new();
    for link in &order_products.rows {
        for product in by_product.left_matches(link) {
            with_product.clone_from(link);
            by_product.extend_row(&mut with_product, product);

            for order in by_order.left_matches(&with_product) {
                out.clone_from(&with_product);
                by_order.extend_row(&mut out, order);
                writer.write_row(&out)?;
            }
        }
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table(name: &str, csv: &str) -> Table {
        Table::from_reader(name, csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_streamed_join_matches_chained_left_joins() {
        let links = table(
            "order_products__prior",
            "order_id,product_id,add_to_cart_order\n1,100,1\n2,100,1\n2,101,2\n9,555,1\n,100,1\n",
        );
        // duplicate product key and a column shared with orders
        let products = table(
            "products",
            "product_id,product_name,eval_set\n100,Banana,p\n101,Milk,p\n101,Milk (dup),p\n",
        );
        let orders = table("orders", "order_id,user_id,eval_set\n1,7,prior\n2,7,prior\n");

        let dir = tempdir().unwrap();
        let path = dir.path().join(JOINED_FILE);
        let written = write_joined_order_products(&links, &products, &orders, &path).unwrap();

        let expected = links
            .left_join(&products, "product_id")
            .unwrap()
            .left_join(&orders, "order_id")
            .unwrap();
        let streamed = Table::read_csv("joined", &path).unwrap();

        assert_eq!(written, expected.len());
        assert_eq!(written, 6);
        assert_eq!(streamed.headers, expected.headers);
        assert_eq!(streamed.headers.last().map(String::as_str), Some("eval_set_y"));
        let as_text = |t: &Table| -> Vec<Vec<String>> {
            t.rows.iter().map(|r| r.iter().map(str::to_string).collect()).collect()
        };
        assert_eq!(as_text(&streamed), as_text(&expected));
    }

    #[test]
    fn test_cleaned_orders_row_count() {
        let orders = table("orders", "order_id,days_since_prior_order\n1,\n2,3.0\n");
        let dir = tempdir().unwrap();
        let path = dir.path().join(ORDERS_CLEANED_FILE);

        assert_eq!(write_cleaned_orders(&orders, &path).unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "order_id,days_since_prior_order\n1,0\n2,3.0\n"
        );
    }
}
