use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use mart_report::FileQuality;

use crate::types::RunSummary;

pub fn print_summary(summary: &RunSummary) {
    println!("Data: {}", summary.data_dir.display());
    match &summary.output_dir {
        Some(dir) => println!("Output: {}", dir.display()),
        None => println!("Output: (none)"),
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Processed"),
        header_cell("Duplicates"),
        header_cell("Missing"),
        header_cell("Standardized"),
        header_cell("Quarantined"),
        header_cell("Loaded"),
    ]);
    apply_table_style(&mut table);
    for index in 1..=6 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut totals = Totals::default();
    for file in &summary.report.files {
        totals.add(file);
        table.add_row(vec![
            Cell::new(&file.file).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(file.processed),
            count_cell(file.duplicates_removed, Color::Yellow),
            count_cell(file.missing_handled, Color::Yellow),
            count_cell(file.standardized, Color::Cyan),
            count_cell(file.quarantined, Color::Red),
            Cell::new(file.loaded).fg(Color::Green),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(totals.processed).add_attribute(Attribute::Bold),
        count_cell(totals.duplicates, Color::Yellow).add_attribute(Attribute::Bold),
        count_cell(totals.missing, Color::Yellow).add_attribute(Attribute::Bold),
        count_cell(totals.standardized, Color::Cyan).add_attribute(Attribute::Bold),
        count_cell(totals.quarantined, Color::Red).add_attribute(Attribute::Bold),
        Cell::new(totals.loaded).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    if !summary.tables.is_empty() {
        let mut tables = Table::new();
        tables.set_header(vec![header_cell("Table"), header_cell("Rows"), header_cell("Keys")]);
        apply_table_style(&mut tables);
        align_column(&mut tables, 1, CellAlignment::Right);
        align_column(&mut tables, 2, CellAlignment::Right);
        for entry in &summary.tables {
            tables.add_row(vec![
                Cell::new(entry.entity.table_name()),
                Cell::new(entry.rows),
                dim_cell(entry.keys),
            ]);
        }
        println!("{tables}");
        println!("Issues recorded: {}", summary.issue_count);
    }

    for path in &summary.written {
        println!("Wrote {}", path.display());
    }
    if let Some(failure) = &summary.failure {
        eprintln!("Run failed: {failure}");
        eprintln!("Counts above are partial.");
    }
}

#[derive(Default)]
struct Totals {
    processed: usize,
    duplicates: usize,
    missing: usize,
    standardized: usize,
    quarantined: usize,
    loaded: usize,
}

impl Totals {
    fn add(&mut self, file: &FileQuality) {
        self.processed += file.processed;
        self.duplicates += file.duplicates_removed;
        self.missing += file.missing_handled;
        self.standardized += file.standardized;
        self.quarantined += file.quarantined;
        self.loaded += file.loaded;
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
