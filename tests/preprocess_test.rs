use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

use insight_prep::config::PreprocessConfig;
use insight_prep::error::PipelineError;
use insight_prep::preprocess::{ORDERS_FILE, ORDER_PRODUCTS_FILE, PRODUCTS_FILE};
use insight_prep::{Preprocessor, Table};

const ORDERS: &str = "\
order_id,user_id,eval_set,order_number,order_dow,order_hour_of_day,days_since_prior_order
1,7,prior,1,2,8,
2,7,prior,2,3,7,10.0
3,9,prior,1,1,12,
4,9,prior,2,4,15,6.0
5,9,train,3,4,9,8.0
";

const ORDER_PRODUCTS: &str = "\
order_id,product_id,add_to_cart_order,reordered
1,100,1,0
2,100,1,1
2,101,2,0
";

const PRODUCTS: &str = "\
product_id,product_name,aisle_id,department_id
100,Banana,24,4
101,\"Milk, Organic\",84,16
";

fn setup(orders: &str, order_products: &str, products: &str) -> (TempDir, PreprocessConfig) {
    let root = tempdir().expect("Failed to create temp directory");
    let config = PreprocessConfig::rooted_at(root.path());
    fs::create_dir_all(&config.raw_dir).unwrap();
    fs::write(config.raw_dir.join(ORDERS_FILE), orders).unwrap();
    fs::write(config.raw_dir.join(ORDER_PRODUCTS_FILE), order_products).unwrap();
    fs::write(config.raw_dir.join(PRODUCTS_FILE), products).unwrap();
    (root, config)
}

#[test]
fn test_outputs_are_written() {
    let (_root, config) = setup(ORDERS, ORDER_PRODUCTS, PRODUCTS);
    assert!(!config.processed_dir.exists());

    let summary = Preprocessor::new(config.clone()).run().unwrap();

    assert!(summary.orders_cleaned.is_file());
    assert!(summary.joined_order_products.is_file());
    assert!(summary.user_rfm_metrics.is_file());
    assert_eq!(summary.orders_cleaned, config.processed_dir.join("orders_cleaned.csv"));
    assert_eq!(summary.joined_order_products, config.processed_dir.join("joined_order_products.csv"));
    assert_eq!(summary.user_rfm_metrics, config.processed_dir.join("user_rfm_metrics.csv"));
}

#[test]
fn test_orders_cleaned_fills_first_orders_with_zero() {
    let (_root, config) = setup(ORDERS, ORDER_PRODUCTS, PRODUCTS);
    let summary = Preprocessor::new(config).run().unwrap();

    let cleaned = Table::read_csv("orders_cleaned", &summary.orders_cleaned).unwrap();
    let raw = Table::from_reader("orders", ORDERS.as_bytes()).unwrap();

    assert_eq!(cleaned.headers, raw.headers);
    assert_eq!(
        cleaned.column("days_since_prior_order").unwrap(),
        vec!["0", "10.0", "0", "6.0", "8.0"]
    );
    for column in ["order_id", "user_id", "eval_set", "order_number", "order_dow", "order_hour_of_day"] {
        assert_eq!(cleaned.column(column).unwrap(), raw.column(column).unwrap());
    }
}

#[test]
fn test_joined_table_keeps_every_link_row() {
    let order_products = "order_id,product_id,add_to_cart_order,reordered\n1,100,1,0\n2,100,1,1\n2,101,2,0\n42,555,1,0\n";
    let (_root, config) = setup(ORDERS, order_products, PRODUCTS);
    let summary = Preprocessor::new(config).run().unwrap();

    let joined = Table::read_csv("joined", &summary.joined_order_products).unwrap();
    assert_eq!(joined.len(), 4);
    assert_eq!(summary.joined_rows, 4);
    assert_eq!(
        joined.headers,
        vec![
            "order_id",
            "product_id",
            "add_to_cart_order",
            "reordered",
            "product_name",
            "aisle_id",
            "department_id",
            "user_id",
            "eval_set",
            "order_number",
            "order_dow",
            "order_hour_of_day",
            "days_since_prior_order",
        ]
    );
    assert_eq!(joined.column("product_name").unwrap(), vec!["Banana", "Banana", "Milk, Organic", ""]);
    assert_eq!(joined.column("user_id").unwrap(), vec!["7", "7", "7", ""]);
    // the joined table carries the raw, unfilled recency
    assert_eq!(joined.column("days_since_prior_order").unwrap(), vec!["", "10.0", "10.0", ""]);
}

#[test]
fn test_rfm_metrics_for_worked_example() {
    let orders = "order_id,user_id,order_number,days_since_prior_order\n1,7,1,\n2,7,2,10\n";
    let order_products = "order_id,product_id\n1,100\n2,100\n2,101\n";
    let (_root, config) = setup(orders, order_products, PRODUCTS);
    let summary = Preprocessor::new(config).run().unwrap();

    let metrics = fs::read_to_string(&summary.user_rfm_metrics).unwrap();
    assert_eq!(
        metrics,
        "user_id,frequency,avg_days_between_orders,avg_basket_size\n7,2,10.0,1.5\n"
    );
}

#[test]
fn test_user_without_products_is_absent_from_metrics() {
    let (_root, config) = setup(ORDERS, ORDER_PRODUCTS, PRODUCTS);
    let summary = Preprocessor::new(config).run().unwrap();

    let metrics = Table::read_csv("user_rfm_metrics", &summary.user_rfm_metrics).unwrap();
    assert_eq!(metrics.column("user_id").unwrap(), vec!["7"]);
    assert_eq!(summary.users, 1);
}

#[test]
fn test_missing_input_is_fatal() {
    let (_root, config) = setup(ORDERS, ORDER_PRODUCTS, PRODUCTS);
    fs::remove_file(config.raw_dir.join(PRODUCTS_FILE)).unwrap();

    let err = Preprocessor::new(config).run().unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
}

#[test]
fn test_missing_column_is_fatal() {
    let orders = "order_id,user_id,order_number\n1,7,1\n";
    let (_root, config) = setup(orders, ORDER_PRODUCTS, PRODUCTS);

    let err = Preprocessor::new(config).run().unwrap_err();
    assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "days_since_prior_order"));
}

#[test]
fn test_failure_in_metrics_leaves_earlier_outputs() {
    let orders = "order_id,user_id,order_number,days_since_prior_order\n1,7,first,\n";
    let (_root, config) = setup(orders, ORDER_PRODUCTS, PRODUCTS);

    let err = Preprocessor::new(config.clone()).run().unwrap_err();

    assert!(matches!(err, PipelineError::InvalidNumber { ref column, row: 0, .. } if column == "order_number"));
    assert!(config.processed_dir.join("orders_cleaned.csv").is_file());
    assert!(config.processed_dir.join("joined_order_products.csv").is_file());
    assert!(!config.processed_dir.join("user_rfm_metrics.csv").exists());
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_single_completion_message_with_counts() {
    let (_root, config) = setup(ORDERS, ORDER_PRODUCTS, PRODUCTS);
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || Preprocessor::new(config).run()).unwrap();

    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    let completion: Vec<&str> = logs
        .lines()
        .filter(|line| line.contains("Processed datasets saved to"))
        .collect();
    assert_eq!(completion.len(), 1, "{logs}");
    assert!(completion[0].contains("joined_rows=3"));
    assert!(completion[0].contains("users=1"));
}
