//! Terminal tables.

use comfy_table::{Attribute, Cell, Color, Table};

use crate::document::{format_day, TotalLine};
use crate::model::{Invoice, Quote};
use crate::money::{format_money, DiscountPolicy, QuoteTotals};
use crate::stats::PeriodStats;

const PAID: Color = Color::Rgb { r: 4, g: 120, b: 87 };
const UNPAID: Color = Color::Rgb { r: 185, g: 28, b: 28 };

fn due_cell(currency: &str, remaining: f64) -> Cell {
    let cell = Cell::new(format_money(currency, remaining));
    if remaining > 0.0 {
        cell.fg(UNPAID)
    } else {
        cell.fg(PAID)
    }
}

pub fn invoice_table(invoices: &[&Invoice], currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Number"),
        Cell::new("Date"),
        Cell::new("Client"),
        Cell::new("Category"),
        Cell::new("Total"),
        Cell::new("Paid"),
        Cell::new("Due"),
    ]);
    for inv in invoices {
        table.add_row(vec![
            Cell::new(&inv.invoice_number).add_attribute(Attribute::Bold),
            Cell::new(format_day(inv.created_at)),
            Cell::new(&inv.client_name),
            Cell::new(&inv.category),
            Cell::new(format_money(currency, inv.total_price)),
            Cell::new(format_money(currency, inv.paid_amount)),
            due_cell(currency, inv.remaining_amount),
        ]);
    }
    table
}

pub fn quote_table(quotes: &[&Quote], currency: &str, policy: DiscountPolicy) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Number"),
        Cell::new("Date"),
        Cell::new("Client"),
        Cell::new("Category"),
        Cell::new("Total"),
        Cell::new("Deposit"),
        Cell::new("Valid until"),
    ]);
    for quote in quotes {
        let totals = QuoteTotals::of(quote, policy);
        let valid_until = quote
            .valid_until
            .map(|d| d.format("%d %b %Y").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&quote.quote_number).add_attribute(Attribute::Bold),
            Cell::new(format_day(quote.created_at)),
            Cell::new(&quote.client_name),
            Cell::new(&quote.category),
            Cell::new(format_money(currency, totals.total)),
            Cell::new(format_money(currency, totals.deposit)),
            Cell::new(valid_until),
        ]);
    }
    table
}

pub fn stats_table(stats: &PeriodStats<'_>, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec![Cell::new(stats.period.label()), Cell::new("")]);
    table.add_row(vec![Cell::new("Total invoices"), Cell::new(stats.count)]);
    table.add_row(vec![
        Cell::new("Total invoice value"),
        Cell::new(format_money(currency, stats.total_value)),
    ]);
    table.add_row(vec![
        Cell::new("Total revenue"),
        Cell::new(format_money(currency, stats.revenue)).fg(PAID),
    ]);
    let unpaid = Cell::new(stats.unpaid_count()).add_attribute(Attribute::Bold);
    table.add_row(vec![
        Cell::new("Unpaid invoices"),
        if stats.unpaid_count() > 0 { unpaid.fg(UNPAID) } else { unpaid },
    ]);
    table.add_row(vec![
        Cell::new("Outstanding"),
        due_cell(currency, stats.outstanding()),
    ]);
    table
}

/// The same rows a printed document carries.
pub fn totals_table(lines: &[TotalLine]) -> Table {
    let mut table = Table::new();
    for line in lines {
        table.add_row(vec![
            Cell::new(&line.label),
            Cell::new(&line.display).add_attribute(Attribute::Bold),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::invoice_total_lines;
    use crate::period::Period;

    fn invoice(number: &str, total: f64, paid: f64) -> Invoice {
        let mut inv = Invoice::new(number, "Jane Doe");
        inv.total_price = total;
        inv.paid_amount = paid;
        inv.remaining_amount = total - paid;
        inv
    }

    #[test]
    fn invoice_rows_show_money() {
        let a = invoice("INV-1", 120.0, 20.0);
        let rendered = invoice_table(&[&a], "£").to_string();
        assert!(rendered.contains("INV-1"));
        assert!(rendered.contains("£120.00"));
        assert!(rendered.contains("£100.00"));
    }

    #[test]
    fn stats_rows() {
        let all = vec![invoice("1", 100.0, 100.0), invoice("2", 50.0, 0.0)];
        let stats = PeriodStats::collect(Period::All, &all);
        let rendered = stats_table(&stats, "£").to_string();
        assert!(rendered.contains("All time"));
        assert!(rendered.contains("£150.00"));
        assert!(rendered.contains("£50.00"));
    }

    #[test]
    fn totals_rows_follow_lines() {
        let inv = invoice("3", 80.0, 80.0);
        let lines = invoice_total_lines(&inv, DiscountPolicy::Flat, "£");
        let rendered = totals_table(&lines).to_string();
        for line in &lines {
            assert!(rendered.contains(&line.display));
        }
    }
}
