//! Turns report files into pages of tables of rows.
//!
//! CSV exports become one page with one table. PDFs are read page by page with `lopdf`; each
//! page's text is split into tables by finding runs of column-aligned lines.

use std::path::{Path, PathBuf};

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::classify::{classify_row, RowClass};
use crate::error::{PipelineError, PipelineResult};

static YEAR_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"20\d{2}-\d{2}").expect("year pattern is valid"));

/// Matches the report exports, e.g. `Placement Report 2023-24.pdf`.
pub const DEFAULT_SOURCE_PATTERN: &str = "Placement*Report*.*";

/// Minimum gap, in spaces, that separates two cells of a text-rendered table row.
const CELL_GAP: usize = 2;

pub type Row = Vec<String>;
pub type Table = Vec<Row>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub name: String,
    pub pages: Vec<Page>,
}

impl SourceDocument {
    pub fn row_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| p.tables.iter())
            .map(|t| t.len())
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Pdf,
    Json,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "pdf" => Some(SourceFormat::Pdf),
            "json" => Some(SourceFormat::Json),
            _ => None,
        }
    }
}

/// First `20YY-YY` token in the file name, e.g. `2017-18` from `Placement-Report_2017-18.pdf`.
pub fn resolve_academic_year(file_name: &str) -> Option<String> {
    YEAR_IN_NAME
        .find(file_name)
        .map(|m| m.as_str().to_string())
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Source files in `dir` matching `pattern`, sorted by name.
pub fn discover_sources(dir: &Path, pattern: &str) -> PipelineResult<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let mut paths = Vec::new();
    for entry in glob::glob(&full.to_string_lossy())? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(err) => debug!(error = %err, "skipping unreadable glob entry"),
        }
    }
    paths.sort_by_key(|p| file_name(p));
    Ok(paths)
}

/// Reads a tabular document. JSON seed files are not tables; see [`crate::seed`].
pub fn read_document(path: &Path) -> PipelineResult<SourceDocument> {
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Csv) => read_csv(path),
        Some(SourceFormat::Pdf) => read_pdf(path),
        Some(SourceFormat::Json) | None => Err(PipelineError::UnsupportedFormat {
            file: file_name(path),
        }),
    }
}

pub fn read_csv(path: &Path) -> PipelineResult<SourceDocument> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record?;
        table.push(record.iter().map(str::to_string).collect());
    }

    Ok(SourceDocument {
        name: file_name(path),
        pages: vec![Page {
            tables: vec![table],
        }],
    })
}

pub fn read_pdf(path: &Path) -> PipelineResult<SourceDocument> {
    let document = Document::load(path)?;
    let mut pages = Vec::new();

    for page_number in document.get_pages().keys() {
        let text = document.extract_text(&[*page_number])?;
        let tables = split_tables(&text);
        debug!(page = page_number, tables = tables.len(), "read pdf page");
        pages.push(Page { tables });
    }

    Ok(SourceDocument {
        name: file_name(path),
        pages,
    })
}

/// Groups consecutive multi-cell lines into tables. Any single-cell line ends the current table.
///
/// Once a header line is seen, the rows below it are placed under the header's columns, so a
/// blank cell stays blank instead of pulling the next value left. Text before any header falls
/// back to plain gap splitting.
pub fn split_tables(text: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Table = Vec::new();
    let mut guide: Option<ColumnGuide> = None;

    for line in text.lines() {
        let cells = match delimited_cells(line) {
            Some(cells) => cells,
            None => {
                let tokens = gap_tokens(line);
                if let Some(header) = ColumnGuide::from_header(&tokens) {
                    guide = Some(header);
                    token_texts(tokens)
                } else {
                    match &guide {
                        Some(guide) if tokens.len() >= 2 => guide.place(tokens),
                        _ => token_texts(tokens),
                    }
                }
            }
        };

        if cells.len() >= 2 {
            current.push(cells);
        } else if !current.is_empty() {
            tables.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tables.push(current);
    }
    tables
}

/// Tab- or pipe-separated cells, kept in place including empty ones.
fn delimited_cells(line: &str) -> Option<Row> {
    let trimmed = line.trim();
    if trimmed.contains('\t') {
        return Some(trimmed.split('\t').map(|c| c.trim().to_string()).collect());
    }
    if trimmed.matches('|').count() >= 2 {
        let inner = trimmed.trim_matches('|');
        return Some(inner.split('|').map(|c| c.trim().to_string()).collect());
    }
    None
}

/// A run of text on a line and the character columns it covers, end exclusive.
#[derive(Debug, Clone, PartialEq)]
struct Token {
    start: usize,
    end: usize,
    text: String,
}

/// Splits on gaps of [`CELL_GAP`] or more spaces.
fn gap_tokens(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut gap = 0;

    for (pos, ch) in line.chars().enumerate() {
        if ch == ' ' {
            gap += 1;
            continue;
        }
        match current.as_mut() {
            Some(token) if gap < CELL_GAP => {
                token.text.extend(std::iter::repeat(' ').take(gap));
                token.text.push(ch);
                token.end = pos + 1;
            }
            _ => {
                tokens.extend(current.take());
                current = Some(Token {
                    start: pos,
                    end: pos + 1,
                    text: ch.to_string(),
                });
            }
        }
        gap = 0;
    }
    tokens.extend(current);
    tokens
}

fn token_texts(tokens: Vec<Token>) -> Row {
    tokens.into_iter().map(|t| t.text).collect()
}

/// Column spans read off a table's header line.
#[derive(Debug, Clone, PartialEq)]
struct ColumnGuide {
    spans: Vec<(usize, usize)>,
}

impl ColumnGuide {
    fn from_header(tokens: &[Token]) -> Option<Self> {
        let cells: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        matches!(classify_row(&cells), RowClass::Header).then(|| Self {
            spans: tokens.iter().map(|t| (t.start, t.end)).collect(),
        })
    }

    /// One cell per header column; tokens landing in the same column are joined.
    fn place(&self, tokens: Vec<Token>) -> Row {
        let mut cells = vec![String::new(); self.spans.len()];
        for token in tokens {
            let cell = &mut cells[self.column_for(&token)];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(&token.text);
        }
        cells
    }

    /// The header span closest to the token's centre. Positions are doubled to stay integral.
    fn column_for(&self, token: &Token) -> usize {
        let centre = token.start + token.end;
        self.spans
            .iter()
            .enumerate()
            .min_by_key(|(_, span)| distance(centre, **span))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}

/// Distance from a doubled position to a span, zero when inside it.
fn distance(doubled: usize, (start, end): (usize, usize)) -> usize {
    if doubled < 2 * start {
        2 * start - doubled
    } else {
        doubled.saturating_sub(2 * end)
    }
}
