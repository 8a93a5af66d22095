use crate::sheet::Sheet;

/// Convert a response sheet to CSV format
///
/// The header row comes first, then one line per response. Cells containing
/// commas, quotes or line breaks are quoted with inner quotes doubled. Short
/// rows are padded to the sheet width.
///
/// # Arguments
/// * `sheet` - Reference to the sheet to convert
///
/// # Returns
/// * `String` - CSV content
///
/// # Examples
/// ```
/// use formrelay::sheet::Sheet;
/// use formrelay::downloader::to_csv;
///
/// let mut sheet = Sheet::with_headers(vec!["Timestamp".to_string(), "Days".to_string()]);
/// sheet.push(vec!["t1".to_string(), "Monday, Friday".to_string()]);
///
/// assert_eq!(to_csv(&sheet), "Timestamp,Days\nt1,\"Monday, Friday\"\n");
/// ```
pub fn to_csv(sheet: &Sheet) -> String {
    let width = sheet.width();
    let mut csv_content = String::new();

    for row in sheet.rows() {
        for c in 0..width {
            if c > 0 {
                csv_content.push(',');
            }
            if let Some(value) = row.get(c) {
                csv_content.push_str(&escape_csv(value));
            }
        }
        csv_content.push('\n');
    }

    csv_content
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert a response sheet to XLSX format
///
/// Every cell is written as a string; the header row is bold and frozen.
///
/// # Arguments
/// * `sheet` - Reference to the sheet to convert
/// * `name` - Worksheet tab name
///
/// # Returns
/// * `Result<Vec<u8>, rust_xlsxwriter::XlsxError>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(sheet: &Sheet, name: &str) -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(name)?;

    let bold = Format::new().set_bold();

    for (r, row) in sheet.rows().iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if r == 0 {
                worksheet.write_string_with_format(0, c as u16, value, &bold)?;
            } else {
                worksheet.write_string(r as u32, c as u16, value)?;
            }
        }
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_doubled() {
        let mut sheet = Sheet::with_headers(vec!["Message".to_string()]);
        sheet.push(vec!["She said \"hi\"".to_string()]);
        assert_eq!(to_csv(&sheet), "Message\n\"She said \"\"hi\"\"\"\n");
    }

    #[test]
    fn short_rows_are_padded() {
        let mut sheet = Sheet::with_headers(vec!["A".to_string(), "B".to_string()]);
        sheet.push(vec!["1".to_string()]);
        assert_eq!(to_csv(&sheet), "A,B\n1,\n");
    }

    #[test]
    fn empty_sheet_is_empty_csv() {
        assert_eq!(to_csv(&Sheet::default()), "");
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_archive() {
        let mut sheet = Sheet::with_headers(vec!["Timestamp".to_string()]);
        sheet.push(vec!["t1".to_string()]);

        let bytes = to_xlsx(&sheet, "events").unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
