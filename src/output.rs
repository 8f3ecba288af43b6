use anyhow::{anyhow, Context, Result};
use csv::WriterBuilder;
use printpdf::*;
use serde::{Deserialize, Serialize};
use serde_json::to_string_pretty;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::report::{CellRef, GroupTable, VariantReport};
use crate::types::Highlight;

/// Supported report formats
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Html,
    Csv,
    Tsv,
    Json,
    All,
}

impl ReportFormat {
    fn expand(self) -> Vec<ReportFormat> {
        match self {
            ReportFormat::All => vec![
                ReportFormat::Pdf,
                ReportFormat::Html,
                ReportFormat::Csv,
                ReportFormat::Tsv,
                ReportFormat::Json,
            ],
            format => vec![format],
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Html => "html",
            ReportFormat::Csv => "csv",
            ReportFormat::Tsv => "tsv",
            ReportFormat::Json => "json",
            ReportFormat::All => "",
        }
    }
}

/// Writes an assembled report to disk in one or more formats
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Result<Self> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).with_context(|| {
                format!("Failed to create output directory {}", output_dir.display())
            })?;
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Render `report` as `<output_dir>/<filename>.<ext>` and return the paths written
    pub fn generate(
        &self,
        report: &VariantReport,
        format: ReportFormat,
        filename: &str,
    ) -> Result<Vec<PathBuf>> {
        let stem = sanitize_filename(filename);
        if stem.is_empty() {
            return Err(anyhow!("Report filename {:?} is empty", filename));
        }

        let mut written = Vec::new();
        for format in format.expand() {
            let path = self
                .output_dir
                .join(format!("{}.{}", stem, format.extension()));

            match format {
                ReportFormat::Pdf => self.generate_pdf_report(report, &path)?,
                ReportFormat::Html => self.generate_html_report(report, &path)?,
                ReportFormat::Csv => self.generate_delimited_report(report, &path, b',')?,
                ReportFormat::Tsv => self.generate_delimited_report(report, &path, b'\t')?,
                ReportFormat::Json => self.generate_json_report(report, &path)?,
                ReportFormat::All => unreachable!("expanded above"),
            }

            info!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }

    fn generate_html_report(&self, report: &VariantReport, path: &Path) -> Result<()> {
        let html_content = create_html_content(report);
        fs::write(path, html_content)
            .with_context(|| format!("Failed to write HTML report to {}", path.display()))
    }

    fn generate_delimited_report(
        &self,
        report: &VariantReport,
        path: &Path,
        delimiter: u8,
    ) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .with_context(|| format!("Failed to create writer for {}", path.display()))?;

        wtr.write_record([
            "group",
            "gene",
            "rs_id",
            "alleles",
            "classification",
            "result",
        ])?;

        for group in &report.groups {
            for row in &group.rows {
                wtr.write_record([
                    group.name.as_str(),
                    row.gene.as_str(),
                    row.marker_id.as_str(),
                    row.alleles.as_str(),
                    row.classification.label(),
                    row.result.as_str(),
                ])?;
            }
        }

        wtr.flush()?;
        Ok(())
    }

    fn generate_json_report(&self, report: &VariantReport, path: &Path) -> Result<()> {
        let json_content =
            to_string_pretty(report).with_context(|| "Failed to serialize report to JSON")?;

        fs::write(path, json_content)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))
    }

    fn generate_pdf_report(&self, report: &VariantReport, path: &Path) -> Result<()> {
        let doc = PdfWriter::render(report)?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create PDF report {}", path.display()))?;
        doc.save(&mut BufWriter::new(file))
            .with_context(|| format!("Failed to write PDF report to {}", path.display()))?;

        Ok(())
    }
}

/// Keep a user-supplied report name inside the output directory
fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn create_html_content(report: &VariantReport) -> String {
    let timestamp = report.generated_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let groups: String = report.groups.iter().map(group_table_html).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: Arial, sans-serif;
            margin: 40px;
            background-color: #f5f5f5;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background-color: white;
            padding: 30px;
            border-radius: 10px;
            box-shadow: 0 0 10px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #5a8782;
        }}
        h2 {{
            color: #516170;
            font-style: italic;
            border-top: 1px solid #333;
            padding-top: 10px;
        }}
        table {{
            width: 100%;
            border-collapse: collapse;
            margin: 20px 0;
        }}
        th, td {{
            border: 1px solid #ddd;
            padding: 8px;
            text-align: left;
        }}
        .result-red {{
            background-color: #ff0000;
            color: black;
        }}
        .result-yellow {{
            background-color: #ffff00;
            color: black;
        }}
        .result-green {{
            background-color: #008000;
            color: black;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        <p>{header}</p>
        <p>Source: {source} ({format}), generated on {timestamp}</p>
        {groups}
    </div>
</body>
</html>"#,
        title = escape_html(&report.title),
        header = escape_html(&report.header),
        source = escape_html(&report.source_file),
        format = report.format,
        timestamp = timestamp,
        groups = groups,
    )
}

fn group_table_html(group: &GroupTable) -> String {
    let mut html = format!(
        "<div class=\"section\"><h2>{}</h2>\n<table>\n<tr>",
        escape_html(&group.name)
    );
    for title in group.header() {
        html.push_str(&format!("<th>{}</th>", title));
    }
    html.push_str("</tr>\n");

    for (index, row) in group.rows.iter().enumerate() {
        html.push_str("<tr>");
        for (column, cell) in row.cells().iter().enumerate() {
            let cell_ref = CellRef {
                column,
                row: index + 1,
            };
            match group.highlight_at(cell_ref) {
                Some(highlight) => html.push_str(&format!(
                    "<td class=\"{}\">{}</td>",
                    highlight.css_class(),
                    escape_html(cell)
                )),
                None => html.push_str(&format!("<td>{}</td>", escape_html(cell))),
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</table>\n</div>\n");
    html
}

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 25.4;
const BOTTOM_MARGIN: f32 = 12.0;
const COLUMN_WIDTHS: [f32; 4] = [26.5, 21.2, 17.6, 97.0];
const TITLE_SIZE: f32 = 18.0;
const GROUP_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 9.0;
const LINE_HEIGHT: f32 = 4.2;
const CELL_PADDING: f32 = 1.5;
const PT_TO_MM: f32 = 0.3528;

/// Approximate characters of body text fitting in a column
fn column_capacity(width: f32) -> usize {
    let average_char_width = BODY_SIZE * 0.5 * PT_TO_MM;
    (((width - 2.0 * CELL_PADDING) / average_char_width).floor() as usize).max(1)
}

/// Greedy word wrap on character counts; long words are split
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn rgb(highlight: Highlight) -> Color {
    let (r, g, b) = highlight.rgb();
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

/// Lays a report out on letter-sized pages
struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    /// Distance of the next line from the bottom of the page
    cursor: f32,
}

impl PdfWriter {
    fn render(report: &VariantReport) -> Result<PdfDocumentReference> {
        let (doc, page, layer) =
            PdfDocument::new(&report.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let italic = doc.add_builtin_font(BuiltinFont::HelveticaOblique)?;
        let layer = doc.get_page(page).get_layer(layer);

        let mut writer = PdfWriter {
            doc,
            layer,
            regular,
            bold,
            italic,
            cursor: PAGE_HEIGHT - MARGIN,
        };

        writer.write_title(report);
        for group in &report.groups {
            writer.write_group(group);
        }

        debug!("Laid out {} groups", report.groups.len());
        Ok(writer.doc)
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height < BOTTOM_MARGIN {
            self.new_page();
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn write_title(&mut self, report: &VariantReport) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.353, 0.529, 0.51, None)));
        self.cursor -= TITLE_SIZE * PT_TO_MM;
        self.text(&report.title, TITLE_SIZE, MARGIN, self.cursor, &self.bold);
        self.layer.set_fill_color(black());
        self.cursor -= LINE_HEIGHT * 2.0;

        let width: f32 = COLUMN_WIDTHS.iter().sum();
        for line in wrap_text(&report.header, column_capacity(width)) {
            self.ensure_space(LINE_HEIGHT);
            self.text(&line, BODY_SIZE + 1.0, MARGIN, self.cursor, &self.regular);
            self.cursor -= LINE_HEIGHT + 0.5;
        }
        self.cursor -= LINE_HEIGHT * 2.0;
    }

    fn write_rule(&mut self) {
        let width: f32 = COLUMN_WIDTHS.iter().sum();
        let rule = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.cursor)), false),
                (Point::new(Mm(MARGIN + width), Mm(self.cursor)), false),
            ],
            is_closed: false,
        };
        self.layer.set_outline_color(black());
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(rule);
        self.cursor -= LINE_HEIGHT;
    }

    fn write_group(&mut self, group: &GroupTable) {
        self.ensure_space(LINE_HEIGHT * 6.0);
        self.write_rule();

        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.318, 0.38, 0.439, None)));
        self.cursor -= GROUP_SIZE * PT_TO_MM;
        self.text(&group.name, GROUP_SIZE, MARGIN, self.cursor, &self.italic);
        self.layer.set_fill_color(black());
        self.cursor -= LINE_HEIGHT;

        let header: Vec<String> = group.header().iter().map(|s| s.to_string()).collect();
        self.write_row(&header, None, true);

        for (index, row) in group.rows.iter().enumerate() {
            let cells: Vec<String> = row.cells().iter().map(|s| s.to_string()).collect();
            let highlights: Vec<Option<Highlight>> = (0..cells.len())
                .map(|column| {
                    group.highlight_at(CellRef {
                        column,
                        row: index + 1,
                    })
                })
                .collect();
            self.write_row(&cells, Some(&highlights), false);
        }

        self.cursor -= LINE_HEIGHT * 2.0;
    }

    fn write_row(&mut self, cells: &[String], highlights: Option<&[Option<Highlight>]>, header: bool) {
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(COLUMN_WIDTHS)
            .map(|(cell, width)| wrap_text(cell, column_capacity(width)))
            .collect();
        let line_count = wrapped.iter().map(Vec::len).max().unwrap_or(1);
        let height = line_count as f32 * LINE_HEIGHT + 2.0 * CELL_PADDING;

        self.ensure_space(height);
        let top = self.cursor;
        let bottom = top - height;

        let mut x = MARGIN;
        for (column, (lines, width)) in wrapped.iter().zip(COLUMN_WIDTHS).enumerate() {
            let highlight = highlights.and_then(|h| h.get(column).copied().flatten());

            let mut cell = Rect::new(Mm(x), Mm(bottom), Mm(x + width), Mm(top));
            if let Some(highlight) = highlight {
                self.layer.set_fill_color(rgb(highlight));
                cell = cell.with_mode(path::PaintMode::FillStroke);
            } else {
                cell = cell.with_mode(path::PaintMode::Stroke);
            }
            self.layer.set_outline_color(black());
            self.layer.set_outline_thickness(0.3);
            self.layer.add_rect(cell);
            self.layer.set_fill_color(black());

            let font = if header { &self.bold } else { &self.regular };
            let mut y = top - CELL_PADDING - BODY_SIZE * PT_TO_MM;
            for line in lines {
                self.text(line, BODY_SIZE, x + CELL_PADDING, y, font);
                y -= LINE_HEIGHT;
            }

            x += width;
        }

        self.cursor = bottom;
    }
}
