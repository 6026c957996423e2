use memchr::{memchr, memchr_iter};
use memmap2::Mmap;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use std::{borrow::Cow, fs::File, path::Path};

use crate::processor::{
    DashboardError, ParseError, ParseSummary,
    column::{Column, ColumnType},
    table::Table,
};

/// Location of one field inside the mapped file.
#[derive(Debug, Clone, Copy)]
struct FieldSpan {
    start: usize,
    end: usize,
    /// Quoted field containing `""` escapes that must be collapsed.
    escaped: bool,
}

/// Field spans for one newline-aligned chunk, stored column-major.
struct ChunkFields {
    columns: Vec<Vec<FieldSpan>>,
    row_count: usize,
    errors: Vec<ParseError>,
}

/// Loads a CSV file into a [`Table`] using memory mapping
///
/// The header line names the columns. Data rows are split into
/// newline-aligned chunks which are tokenized in parallel; column types are
/// then inferred over every value (int, float, string). Empty fields are
/// nulls. Quoted fields may contain commas and `""` escapes but not newlines.
///
/// Rows whose field count does not match the header are skipped and reported
/// in the returned [`ParseSummary`].
///
/// # Errors
/// Returns a [`DashboardError`] if the file cannot be opened or mapped.
pub fn read_csv_table(name: &str, path: &Path) -> Result<(Table, ParseSummary), DashboardError> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok((Table::empty(name), ParseSummary::default()));
    }
    let mmap = unsafe { Mmap::map(&file)? };
    parse_csv_bytes(name, &mmap[..])
}

/// Parses an in-memory CSV buffer. See [`read_csv_table`].
pub fn parse_csv_bytes(name: &str, buf: &[u8]) -> Result<(Table, ParseSummary), DashboardError> {
    let buf = buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(buf);

    // Parse header
    let header_end = memchr(b'\n', buf).unwrap_or(buf.len());
    let header_line = trim_cr(&buf[..header_end]);
    if header_line.is_empty() {
        return Ok((Table::empty(name), ParseSummary::default()));
    }
    let mut header_spans = Vec::new();
    split_fields(header_line, 0, &mut header_spans);
    let headers: Vec<String> = header_spans
        .iter()
        .map(|span| String::from_utf8_lossy(&field_bytes(header_line, *span)).trim().to_string())
        .collect();

    let data_start = (header_end + 1).min(buf.len());
    let data = &buf[data_start..];

    // Find chunk boundaries (split by newlines)
    let num_threads = rayon::current_num_threads().max(1);
    let chunks = find_chunk_boundaries(data, num_threads);

    // Tokenize chunks in parallel
    let chunk_fields: Vec<ChunkFields> = chunks
        .par_iter()
        .map(|(start, end)| tokenize_chunk(&data[*start..*end], *start, &headers))
        .collect();

    // Row numbers in errors are relative to their chunk until rebased here
    let mut row_offset = 0;
    let mut errors = Vec::new();
    for chunk in &chunk_fields {
        errors.extend(chunk.errors.iter().map(|e| ParseError {
            row: row_offset + e.row,
            column: e.column.clone(),
            value: e.value.clone(),
            error: e.error.clone(),
        }));
        row_offset += chunk.row_count;
    }
    let total_rows = row_offset;

    // Infer and materialize each column in parallel
    let parsed: Vec<(Column, Vec<(usize, String)>)> = (0..headers.len())
        .into_par_iter()
        .map(|col_idx| {
            let raw: Vec<Cow<'_, [u8]>> = chunk_fields
                .iter()
                .flat_map(|chunk| chunk.columns[col_idx].iter())
                .map(|span| field_bytes(data, *span))
                .collect();
            let column_type = ColumnType::infer(raw.iter().map(|f| &**f));
            Column::parse(column_type, raw.iter().map(|f| Some(&**f)))
        })
        .collect();

    let mut columns = Vec::with_capacity(headers.len());
    for (header, (column, rejected)) in headers.iter().zip(parsed) {
        errors.extend(rejected.into_iter().map(|(row, value)| ParseError {
            row,
            column: header.clone(),
            value,
            error: Some("value does not match inferred column type".into()),
        }));
        columns.push((header.clone(), column));
    }

    let table = Table::from_columns(name, columns)?;

    Ok((
        table,
        ParseSummary {
            rows_processed: total_rows,
            errors,
        },
    ))
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn field_bytes(buf: &[u8], span: FieldSpan) -> Cow<'_, [u8]> {
    let raw = &buf[span.start..span.end];
    if !span.escaped {
        return Cow::Borrowed(raw);
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        out.push(raw[i]);
        if raw[i] == b'"' && raw.get(i + 1) == Some(&b'"') {
            i += 1;
        }
        i += 1;
    }
    Cow::Owned(out)
}

/// Splits one line into field spans, honouring double-quoted fields.
/// `base` is the absolute offset of `line` within the buffer.
fn split_fields(line: &[u8], base: usize, out: &mut Vec<FieldSpan>) {
    out.clear();
    let n = line.len();
    let mut i = 0;

    loop {
        if i < n && line[i] == b'"' {
            let start = i + 1;
            let mut j = start;
            let mut escaped = false;
            let end = loop {
                match memchr(b'"', &line[j..]) {
                    Some(p) => {
                        let q = j + p;
                        if line.get(q + 1) == Some(&b'"') {
                            escaped = true;
                            j = q + 2;
                            continue;
                        }
                        break q;
                    }
                    None => break n,
                }
            };
            out.push(FieldSpan {
                start: base + start,
                end: base + end,
                escaped,
            });
            let after = (end + 1).min(n);
            match memchr(b',', &line[after..]) {
                Some(p) => i = after + p + 1,
                None => return,
            }
        } else {
            match memchr(b',', &line[i..]) {
                Some(p) => {
                    out.push(FieldSpan {
                        start: base + i,
                        end: base + i + p,
                        escaped: false,
                    });
                    i += p + 1;
                }
                None => {
                    out.push(FieldSpan {
                        start: base + i,
                        end: base + n,
                        escaped: false,
                    });
                    return;
                }
            }
        }
    }
}

fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
    if data.is_empty() {
        return vec![];
    }

    let chunk_size = data.len() / num_chunks;
    let mut boundaries = Vec::with_capacity(num_chunks);
    let mut start = 0;

    for i in 0..num_chunks - 1 {
        let mut end = ((i + 1) * chunk_size).max(start);

        // Find next newline
        match memchr(b'\n', &data[end.min(data.len())..]) {
            Some(p) => end += p + 1,
            None => end = data.len(),
        }

        if start < end {
            boundaries.push((start, end));
        }
        start = end;
        if start >= data.len() {
            break;
        }
    }

    // Last chunk gets everything remaining
    if start < data.len() {
        boundaries.push((start, data.len()));
    }

    boundaries
}

fn tokenize_chunk(chunk: &[u8], chunk_offset: usize, headers: &[String]) -> ChunkFields {
    let num_cols = headers.len();
    let estimated_rows = chunk.len() / 32 + 1;
    let mut columns: Vec<Vec<FieldSpan>> = (0..num_cols)
        .map(|_| Vec::with_capacity(estimated_rows))
        .collect();
    let mut errors = Vec::new();
    let mut row_count = 0;
    let mut line_no = 0;
    let mut fields = Vec::with_capacity(num_cols);

    let mut start = 0;
    let line_ends = memchr_iter(b'\n', chunk).chain(std::iter::once(chunk.len()));
    for end in line_ends {
        if start > chunk.len() {
            break;
        }
        let line = trim_cr(&chunk[start..end]);
        let line_offset = chunk_offset + start;
        start = end + 1;
        line_no += 1;

        if line.is_empty() {
            continue;
        }

        split_fields(line, line_offset, &mut fields);

        if fields.len() != num_cols {
            errors.push(ParseError {
                row: row_count,
                column: "".to_string(),
                value: format!("Expected {} fields, got {}", num_cols, fields.len()),
                error: Some(format!("malformed line {line_no} of chunk")),
            });
            continue;
        }

        for (col, span) in columns.iter_mut().zip(&fields) {
            col.push(*span);
        }
        row_count += 1;
    }

    ChunkFields {
        columns,
        row_count,
        errors,
    }
}
