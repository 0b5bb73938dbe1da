//! Minimal box-drawn table renderer.

use std::io::{self, Write};

use unicode_width::UnicodeWidthStr;

/// Horizontal alignment of a table column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

/// Table with a header row and per-column alignment.
#[derive(Debug, Clone, Default)]
pub struct Table {
    header: Vec<String>,
    alignments: Vec<Alignment>,
    rows: Vec<Vec<String>>,
}

impl Table {
    #[must_use]
    pub const fn new(header: Vec<String>, alignments: Vec<Alignment>) -> Self {
        Self {
            header,
            alignments,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column widths in terminal display columns, sized by the widest cell line.
    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(|cell| cell_width(cell)).collect();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                let width = cell_width(cell);
                if index < widths.len() {
                    widths[index] = widths[index].max(width);
                } else {
                    widths.push(width);
                }
            }
        }
        widths
    }

    /// Write the table to `writer`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn render<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let widths = self.column_widths();
        if widths.is_empty() {
            return Ok(());
        }

        let mut output = String::new();
        push_border(&mut output, &widths, ('┌', '┬', '┐'));
        self.push_row(&mut output, &self.header, &widths);
        push_border(&mut output, &widths, ('├', '┼', '┤'));
        for row in &self.rows {
            self.push_row(&mut output, row, &widths);
        }
        push_border(&mut output, &widths, ('└', '┴', '┘'));

        writer.write_all(output.as_bytes())
    }

    /// Write one logical row, using one physical line per cell line.
    fn push_row(&self, output: &mut String, row: &[String], widths: &[usize]) {
        let cells: Vec<Vec<String>> = (0..widths.len())
            .map(|index| cell_lines(row.get(index).map_or("", String::as_str)))
            .collect();
        let height = cells.iter().map(Vec::len).max().unwrap_or(1);

        for line_index in 0..height {
            output.push('│');
            for (index, width) in widths.iter().enumerate() {
                let line = cells[index].get(line_index).map_or("", String::as_str);
                let padding = " ".repeat(width.saturating_sub(line.width()));
                output.push(' ');
                match self.alignments.get(index).copied().unwrap_or_default() {
                    Alignment::Left => {
                        output.push_str(line);
                        output.push_str(&padding);
                    }
                    Alignment::Right => {
                        output.push_str(&padding);
                        output.push_str(line);
                    }
                }
                output.push_str(" │");
            }
            output.push('\n');
        }
    }
}

/// Split a cell into display lines. Remaining control characters become spaces.
fn cell_lines(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        return vec![String::new()];
    }
    cell.lines()
        .map(|line| line.chars().map(|c| if c.is_control() { ' ' } else { c }).collect())
        .collect()
}

fn cell_width(cell: &str) -> usize {
    cell_lines(cell).iter().map(|line| line.width()).max().unwrap_or(0)
}

fn push_border(output: &mut String, widths: &[usize], (left, middle, right): (char, char, char)) {
    output.push(left);
    for (index, width) in widths.iter().enumerate() {
        if index > 0 {
            output.push(middle);
        }
        output.push_str(&"─".repeat(width + 2));
    }
    output.push(right);
    output.push('\n');
}
