//! Self-contained HTML snapshot of a document model.

use std::fmt::Write;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::css::{escape_attr, escape_text};
use crate::model::{Block, DocumentModel, ImagePlaceholder, ParagraphProfile, Table, VMerge};
use crate::render::list::ListCounterState;
use crate::render::{MARKER_CLASS, P_INDEX_ATTR, marker_style, paragraph_declarations, run_style_css};

const EMPTY_SHELL: &str =
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/></head><body></body></html>";

/// Wrap a body fragment into a full document. Input that already is a document is
/// returned unchanged; blank input yields an empty shell.
pub fn build_html_snapshot(fragment: &str) -> String {
    if fragment.trim().is_empty() {
        return EMPTY_SHELL.to_string();
    }
    if fragment.to_ascii_lowercase().contains("<html") {
        return fragment.to_string();
    }
    format!("<!DOCTYPE html><html><head><meta charset=\"utf-8\"/></head><body>{fragment}</body></html>")
}

/// Render the model to markup. Deterministic: the same model yields the same bytes.
pub fn render_snapshot(model: &DocumentModel) -> String {
    let t0 = Instant::now();
    let mut writer = SnapshotWriter {
        model,
        counters: ListCounterState::new(),
        out: String::new(),
    };
    writer.blocks(&model.blocks);

    let page = &model.page;
    let family = model
        .body
        .font_family
        .as_deref()
        .map(|f| format!("font-family:{f};"))
        .unwrap_or_default();
    let html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/><title>{title}</title></head>\
         <body style=\"{family}font-size:{font:.2}px;width:{width:.2}px;margin:0 auto;padding:{top:.2}px 0 {bottom:.2}px 0\">{body}</body></html>",
        title = escape_text(&model.source_name),
        font = model.body.font_px,
        width = page.content_width(),
        top = page.margin_top_px,
        bottom = page.margin_bottom_px,
        body = writer.out,
    );
    log::info!(
        "Rendered snapshot of '{}': {} paragraphs, {} bytes in {:.1}ms",
        model.source_name,
        model.paragraphs.len(),
        html.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    html
}

struct SnapshotWriter<'m> {
    model: &'m DocumentModel,
    counters: ListCounterState,
    out: String,
}

impl SnapshotWriter<'_> {
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(index) => {
                    if let Some(paragraph) = self.model.paragraphs.get(*index) {
                        self.paragraph(paragraph);
                    }
                }
                Block::Table(table) => self.table(table),
            }
        }
    }

    fn paragraph(&mut self, p: &ParagraphProfile) {
        let tag = match p.heading_level() {
            Some(level) => format!("h{level}"),
            None => "p".to_string(),
        };
        let _ = write!(self.out, "<{tag}");
        if let Some(class) = &p.style_id {
            let _ = write!(self.out, " class=\"{}\"", escape_attr(class));
        }
        let _ = write!(self.out, " {P_INDEX_ATTR}=\"{}\"", p.index);
        let style = paragraph_declarations(p)
            .into_iter()
            .map(|(property, value)| format!("{property}:{value}"))
            .collect::<Vec<_>>()
            .join(";");
        let _ = write!(self.out, " style=\"{}\"", escape_attr(&style));
        if p.is_empty() {
            self.out.push_str(" data-word-empty=\"1\"");
        }
        self.out.push('>');

        if let Some(binding) = &p.list {
            let marker = self.counters.next_marker(binding, p.section_break_before);
            let _ = write!(
                self.out,
                "<span class=\"{MARKER_CLASS}\" style=\"{}\">{} </span>",
                marker_style(binding.level),
                escape_text(&marker)
            );
        }

        let mut wrote_content = false;
        for run in &p.runs {
            if let Some(image) = &run.image {
                self.image(image);
                wrote_content = true;
                continue;
            }
            if run.text.is_empty() {
                continue;
            }
            let text = run
                .text
                .split('\n')
                .map(escape_text)
                .collect::<Vec<_>>()
                .join("<br/>");
            let css = run_style_css(&run.style);
            if css.is_empty() {
                self.out.push_str(&text);
            } else {
                let _ = write!(self.out, "<span style=\"{}\">{text}</span>", escape_attr(&css));
            }
            wrote_content = true;
        }
        if !wrote_content {
            self.out.push_str("<br/>");
        }
        let _ = write!(self.out, "</{tag}>");
    }

    fn image(&mut self, image: &ImagePlaceholder) {
        let width = image.frame_width_px;
        let height = image.frame_height_px;
        self.out.push_str("<img");
        if !image.data.is_empty() {
            let mime = image.mime_type.unwrap_or("application/octet-stream");
            let _ = write!(self.out, " src=\"data:{mime};base64,{}\"", STANDARD.encode(&image.data));
        } else {
            let _ = write!(self.out, " data-word-unresolved=\"{}\"", escape_attr(&image.rel_id));
        }
        let _ = write!(
            self.out,
            " width=\"{}\" height=\"{}\" style=\"width:{width:.2}px;height:{height:.2}px\" alt=\"\"/>",
            width.round() as i64,
            height.round() as i64
        );
    }

    fn table(&mut self, table: &Table) {
        self.out
            .push_str("<table style=\"border-collapse:collapse;border-spacing:0;width:100%\"><tbody>");
        let pad = &table.cell_padding;
        for (r, row) in table.rows.iter().enumerate() {
            self.out.push_str("<tr>");
            let mut column = 0usize;
            for cell in &row.cells {
                let span = usize::from(cell.grid_span.max(1));
                let start = column;
                column += span;
                if cell.v_merge == VMerge::Continue {
                    continue;
                }
                self.out.push_str("<td");
                if span > 1 {
                    let _ = write!(self.out, " colspan=\"{span}\"");
                }
                if cell.v_merge == VMerge::Restart {
                    let rows = 1 + continued_rows(table, r, start);
                    if rows > 1 {
                        let _ = write!(self.out, " rowspan=\"{rows}\"");
                    }
                }
                let _ = write!(
                    self.out,
                    " style=\"padding:{:.2}px {:.2}px {:.2}px {:.2}px;vertical-align:top",
                    pad.top_px, pad.right_px, pad.bottom_px, pad.left_px
                );
                if let Some(width) = cell.width_px {
                    let _ = write!(self.out, ";width:{width:.2}px");
                }
                self.out.push_str("\">");
                self.blocks(&cell.blocks);
                self.out.push_str("</td>");
            }
            self.out.push_str("</tr>");
        }
        self.out.push_str("</tbody></table>");
    }
}

/// Rows below `row` whose cell at grid column `column` continues a vertical merge.
fn continued_rows(table: &Table, row: usize, column: usize) -> usize {
    table.rows[row + 1..]
        .iter()
        .take_while(|next| {
            let mut start = 0usize;
            next.cells.iter().any(|cell| {
                let here = start;
                start += usize::from(cell.grid_span.max(1));
                here == column && cell.v_merge == VMerge::Continue
            })
        })
        .count()
}
