//! Create a sample SQLite database of orders

use std::path::Path;
use rusqlite::{Connection, Result};

const REGIONS: [&str; 5] = ["north", "south", "east", "west", ""];
const PRODUCTS: [&str; 6] = ["anvil", "bolt", "crate", "drill", "engine", "funnel"];

/// Create and populate the `orders` table at `path`, replacing any previous table
pub fn create_sample_database(path: &Path, rows: usize) -> Result<()> {
    let mut conn = Connection::open(path)?;

    conn.execute_batch(
        "
        DROP TABLE IF EXISTS orders;
        CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            customer TEXT NOT NULL,
            product TEXT,
            region TEXT,
            quantity INTEGER,
            amount REAL
        );
        ",
    )?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO orders (id, customer, product, region, quantity, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        let mut rng = 42u32;
        for i in 0..rows {
            let region = REGIONS[random_int(&mut rng) as usize % REGIONS.len()];
            let product = PRODUCTS[random_int(&mut rng) as usize % PRODUCTS.len()];
            let quantity = 1 + random_int(&mut rng) % 20;
            let amount = (quantity as f64) * (5.0 + random_float(&mut rng) * 95.0);

            stmt.execute((
                i as i64,
                format!("customer_{:03}", i % 97),
                product,
                // Empty regions are stored as NULL half of the time
                (!region.is_empty() || i % 2 == 0).then_some(region),
                quantity,
                (amount * 100.0).round() / 100.0,
            ))?;
        }
    }
    tx.commit()?;

    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_orders_region ON orders(region);")?;
    Ok(())
}

fn random_float(seed: &mut u32) -> f64 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    (*seed as f64) / (u32::MAX as f64)
}

fn random_int(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_requested_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.db");
        create_sample_database(&path, 37).unwrap();
        // Recreating replaces instead of appending
        create_sample_database(&path, 37).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 37);
    }
}
