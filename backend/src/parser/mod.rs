//! Survey export reader with encoding and delimiter auto-detection.
//!
//! Turns CSV bytes into [`RawRecord`]s keyed by header name. Nothing here
//! knows about items or prices.

use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::RawRecord;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows
    pub records: Vec<RawRecord>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers, trimmed, in file order
    pub headers: Vec<String>,
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// True for XLSX (zip) and legacy XLS (OLE) workbooks.
pub fn is_spreadsheet(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

/// Detect the encoding of raw bytes.
///
/// Anything that is valid UTF-8 is taken as UTF-8; chardet only guesses for
/// the rest, where a few accented letters would otherwise read as Latin-1.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if body.len() < bytes.len() || std::str::from_utf8(body).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding. A UTF-8 BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => {
                let (text, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(CsvError::EncodingError(format!(
                        "content is not valid {}",
                        enc.name()
                    )));
                }
                text.into_owned()
            }
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    Ok(decoded)
}

/// Detect the delimiter by counting unquoted occurrences in the header line.
///
/// Falls back to `,` when the header has a single column.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = count_unquoted(first_line, sep);
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn count_unquoted(line: &str, sep: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}

/// Parse CSV text into rows with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use pricereshape::parser::csv_to_records;
///
/// let csv = "Submission ID,Items to Choose\n1,\"Rice, Flour\"";
/// let rows = csv_to_records(csv, ',').unwrap();
/// assert_eq!(rows[0].get("Items to Choose"), Some("Rice, Flour"));
/// ```
pub fn csv_to_records(csv: &str, delimiter: char) -> CsvResult<Vec<RawRecord>> {
    parse_string_with_metadata(csv, delimiter, "utf-8".to_string()).map(|r| r.records)
}

/// Parse CSV from a reader. The content is expected to be UTF-8.
pub fn parse_csv<R: Read>(mut reader: R, delimiter: char) -> CsvResult<ParseResult> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let content = decode_content(&bytes, "utf-8")?;
    parse_string_with_metadata(&content, delimiter, "utf-8".to_string())
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("/path/to/survey.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Records: {}", result.records.len());
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    parse_csv_file(path, None)
}

/// Parse a CSV file, auto-detecting encoding and, unless given, the delimiter.
pub fn parse_csv_file<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    if path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xls"))
    {
        return Err(spreadsheet_error());
    }

    let bytes = std::fs::read(path)?;
    parse_bytes_with(&bytes, delimiter)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    parse_bytes_with(bytes, None)
}

/// Parse CSV bytes, auto-detecting encoding and, unless given, the delimiter.
pub fn parse_bytes_with(bytes: &[u8], delimiter: Option<char>) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if is_spreadsheet(bytes) {
        return Err(spreadsheet_error());
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));

    parse_string_with_metadata(&content, delimiter, encoding)
}

fn spreadsheet_error() -> CsvError {
    CsvError::UnsupportedFormat(
        "spreadsheet workbooks are not read directly; export the first sheet as CSV".to_string(),
    )
}

/// Parse CSV text with an explicit delimiter and return metadata.
///
/// Quoted fields may contain the delimiter. Short rows are padded with empty
/// cells, surplus cells are ignored and blank lines are skipped. When a header
/// repeats, the first column with that name wins.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter_byte = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CsvError::parse(1, format!("delimiter '{}' is not ASCII", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(to_parse_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(to_parse_error)?;

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut record = RawRecord::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() || record.contains(header) {
                continue;
            }
            record.insert(header.clone(), row.get(i).unwrap_or(""));
        }
        records.push(record);
    }

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

fn to_parse_error(err: csv::Error) -> CsvError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(0);
    CsvError::parse(line, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_simple_csv() {
        let csv = "name;age\nAlice;30\nBob;25";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("Alice"));
        assert_eq!(rows[0].get("age"), Some("30"));
        assert_eq!(rows[1].get("name"), Some("Bob"));
    }

    #[test]
    fn test_quoted_items_field_kept_whole() {
        let csv = "Submission ID,Items to Choose,Value - Rice\n1,\"Rice, Flour\",50";
        let rows = csv_to_records(csv, ',').unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Items to Choose"), Some("Rice, Flour"));
        assert_eq!(rows[0].get("Value - Rice"), Some("50"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a,b\n1,2\n\n,\n3,4\n";
        let rows = csv_to_records(csv, ',').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_short_rows_padded_and_extra_cells_ignored() {
        let csv = "a,b,c\n1\n4,5,6,7";
        let rows = csv_to_records(csv, ',').unwrap();

        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(rows[0].get("c"), Some(""));
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_headers_trimmed() {
        let result = parse_bytes_auto(b" Submission ID , UserId \n1,u").unwrap();
        assert_eq!(result.headers, vec!["Submission ID", "UserId"]);
        assert_eq!(result.records[0].get("Submission ID"), Some("1"));
    }

    #[test]
    fn test_duplicate_header_first_wins() {
        let rows = csv_to_records("a,a\n1,2", ',').unwrap();
        assert_eq!(rows[0].get("a"), Some("1"));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(csv_to_records("", ','), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_bytes_auto(b""), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let err = parse_string_with_metadata("a,b\n1,2", '→', "utf-8".into()).unwrap_err();
        assert!(err.to_string().contains("not ASCII"));
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted_commas() {
        let content = "\"Items, chosen\";b;c\n1;2;3";
        assert_eq!(detect_delimiter(content), ';');
    }

    #[test]
    fn test_detect_delimiter_variants() {
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let csv = "name;age\nAlice;30\nBob;25";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_bom_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"Submission ID,UserId\n1,u");
        let result = parse_bytes_auto(&bytes).unwrap();
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.headers[0], "Submission ID");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_utf8_accents_not_mistaken_for_latin1() {
        let csv = "Submission ID,UserId,Submission time,DistrictName,UpazilaName,Items to Choose,Value - Rice\n1,u,t,Café,Savar,Rice,50\n";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.records[0].get("DistrictName"), Some("Café"));
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_detection() {
        // "Société" in ISO-8859-1, not valid UTF-8
        let bytes: &[u8] = b"District\nSoci\xE9t\xE9\n";
        let result = parse_bytes_auto(bytes).unwrap();

        assert_ne!(result.encoding, "utf-8");
        let district = result.records[0].value("District");
        assert!(district.starts_with("Soci"));
        assert!(!district.contains('\u{FFFD}'));
    }

    #[test]
    fn test_parse_csv_from_reader() {
        let reader = std::io::Cursor::new("Submission ID;Items to Choose\n4;\"Rice, Eggs\"\n");
        let result = parse_csv(reader, ';').unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.records[0].get("Items to Choose"), Some("Rice, Eggs"));
    }

    #[test]
    fn test_spreadsheet_rejected() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0; 16]);
        assert!(matches!(
            parse_bytes_auto(&bytes),
            Err(CsvError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_file_with_explicit_delimiter() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a|b\n1|2\n").unwrap();

        let result = parse_csv_file(file.path(), Some('|')).unwrap();
        assert_eq!(result.delimiter, '|');
        assert_eq!(result.records[0].get("b"), Some("2"));
    }

    #[test]
    fn test_xlsx_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.xlsx");
        std::fs::write(&path, "a,b\n1,2").unwrap();
        assert!(matches!(
            parse_csv_file_auto(&path),
            Err(CsvError::UnsupportedFormat(_))
        ));
    }
}
