use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::ReconError;
use crate::models::{RawInvoiceRecord, RawLineRecord};

/// 从 JSON 数组读取原始发票
pub fn read_invoices_json<R: Read>(reader: R) -> Result<Vec<RawInvoiceRecord>, ReconError> {
    Ok(serde_json::from_reader(reader)?)
}

/// 从带表头的 CSV 读取明细行，列名与字段名一致
pub fn read_lines_csv<R: Read>(reader: R) -> Result<Vec<RawLineRecord>, ReconError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut lines = Vec::new();
    for record in rdr.deserialize() {
        lines.push(record?);
    }
    Ok(lines)
}

pub fn load_invoices(path: impl AsRef<Path>) -> Result<Vec<RawInvoiceRecord>, ReconError> {
    let invoices = read_invoices_json(BufReader::new(File::open(path.as_ref())?))?;
    tracing::info!("读取发票 {} 张: {}", invoices.len(), path.as_ref().display());
    Ok(invoices)
}

pub fn load_lines(path: impl AsRef<Path>) -> Result<Vec<RawLineRecord>, ReconError> {
    let lines = read_lines_csv(File::open(path.as_ref())?)?;
    tracing::info!("读取明细 {} 行: {}", lines.len(), path.as_ref().display());
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawField;

    #[test]
    fn reads_invoice_array() {
        let json = r#"[
            {"filename": "a.pdf", "purchase_order": "5600025054", "total_net": 9.84,
             "invoice_references": [{"batch_id": "4949", "assignment_id": "65744"}]},
            {"success": false, "filename": "b.pdf"}
        ]"#;
        let invoices = read_invoices_json(json.as_bytes()).unwrap();
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].source_id.as_deref(), Some("a.pdf"));
        assert!(invoices[0].success);
        assert_eq!(invoices[0].references.len(), 1);
        assert!(!invoices[1].success);
    }

    #[test]
    fn reads_line_csv_with_locale_amounts() {
        let data = "\
is_valid,order_number,net_amount,cost_center,collaborator,supplier,source_filename,statement_date,project
true,5600025054,\"4,92\",4949_65744,Alice,Randstad,lines.xlsx,2024-03-31,
false,5600025054,12.5,,,,,,
";
        let lines = read_lines_csv(data.as_bytes()).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].is_valid);
        assert_eq!(lines[0].net_amount, Some(RawField::Text("4,92".into())));
        assert_eq!(lines[0].cost_center.as_deref(), Some("4949_65744"));
        assert_eq!(lines[0].project, None);
        assert!(!lines[1].is_valid);
        assert_eq!(lines[1].collaborator, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(read_invoices_json("{".as_bytes()), Err(ReconError::Json(_))));
    }
}
