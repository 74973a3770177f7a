// src/io/history.rs

use crate::error::{ForecastError, Result};
use crate::model::records::SalesRecord;
use std::path::Path;
use tracing::info;

/// Reads sales records from CSV with a header row.
///
/// Expected columns: `date,product_id,variant_id,market_id,quantity_sold,price,cost`,
/// dates as `YYYY-MM-DD`, an empty `variant_id` for plain products.
pub fn read_sales_csv<P: AsRef<Path>>(path: P) -> Result<Vec<SalesRecord>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)?;
    let records = read_records(&mut rdr)?;
    info!(rows = records.len(), path = %path.display(), "sales history loaded");
    Ok(records)
}

pub fn read_sales_from<R: std::io::Read>(reader: R) -> Result<Vec<SalesRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    read_records(&mut rdr)
}

fn read_records<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<SalesRecord>> {
    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<SalesRecord>().enumerate() {
        let record = result?;
        if !record.price.is_finite() || !record.cost.is_finite() {
            return Err(ForecastError::InvalidParameter(format!(
                "row {}: price and cost must be finite",
                row + 1
            )));
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_reads_optional_variant() {
        let raw = "\
date,product_id,variant_id,market_id,quantity_sold,price,cost
2024-06-01,P1,,M1,12,5.0,2.0
2024-06-01,P2,V1,M1,3,9.5,4.0
";
        let records = read_sales_from(raw.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].variant_id, None);
        assert_eq!(records[1].variant_id.as_deref(), Some("V1"));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let raw = "\
date,product_id,variant_id,market_id,quantity_sold,price,cost
2024-06-01,P1,,M1,-2,5.0,2.0
";
        assert!(matches!(read_sales_from(raw.as_bytes()), Err(ForecastError::Csv(_))));
    }
}
