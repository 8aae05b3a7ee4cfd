use crate::model::Invoice;
use crate::period::Period;

/// Headline figures for the invoices created within a period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStats<'a> {
    pub period: Period,
    pub count: usize,
    /// Sum of invoice totals.
    pub total_value: f64,
    /// Sum of amounts actually paid.
    pub revenue: f64,
    pub unpaid: Vec<&'a Invoice>,
}

impl<'a> PeriodStats<'a> {
    pub fn collect(period: Period, invoices: &'a [Invoice]) -> Self {
        let in_period = period.apply(invoices);
        let total_value = in_period.iter().map(|inv| inv.total_price).sum();
        let revenue = in_period.iter().map(|inv| inv.paid_amount).sum();
        let unpaid: Vec<&Invoice> = in_period
            .iter()
            .copied()
            .filter(|inv| inv.remaining_amount > 0.0)
            .collect();
        PeriodStats { period, count: in_period.len(), total_value, revenue, unpaid }
    }

    pub fn unpaid_count(&self) -> usize {
        self.unpaid.len()
    }

    /// Still owed across the unpaid invoices.
    pub fn outstanding(&self) -> f64 {
        self.unpaid.iter().map(|inv| inv.remaining_amount).sum()
    }
}
