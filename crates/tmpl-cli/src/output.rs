use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Left-aligned columns separated by two spaces; trailing padding trimmed.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    for line in format_table(headers, rows) {
        println!("{line}");
    }
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let separator: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(pad_row(headers.iter().copied(), &widths));
    lines.push(pad_row(separator.iter().map(String::as_str), &widths));
    for row in rows {
        lines.push(pad_row(row.iter().map(String::as_str), &widths));
    }
    lines
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:w$}"))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}
