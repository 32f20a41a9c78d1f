use rust_decimal::Decimal;

use crate::models::{Currency, CurrencyTotals};

/// Накопитель сумм с жёстким разделением валют. Сложение EGP и GBP
/// в один скаляр непредставимо по построению.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrencyLedger {
    egp: Decimal,
    gbp: Decimal,
}

impl CurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, currency: Currency, amount: Decimal) {
        match currency {
            Currency::Egp => self.egp += amount,
            Currency::Gbp => self.gbp += amount,
        }
    }

    pub fn merge(&mut self, other: &CurrencyLedger) {
        self.egp += other.egp;
        self.gbp += other.gbp;
    }

    /// Срез итогов; отсутствующие валюты отдаются нулями
    pub fn snapshot(&self) -> CurrencyTotals {
        CurrencyTotals {
            egp: self.egp,
            gbp: self.gbp,
        }
    }

    /// Сальдо: из каждой валюты `self` вычитается та же валюта `other`
    pub fn minus(&self, other: &CurrencyLedger) -> CurrencyTotals {
        CurrencyTotals {
            egp: self.egp - other.egp,
            gbp: self.gbp - other.gbp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn test_empty_snapshot_is_zero() {
        let ledger = CurrencyLedger::new();
        let totals = ledger.snapshot();
        assert_eq!(totals.egp, Decimal::ZERO);
        assert_eq!(totals.gbp, Decimal::ZERO);
    }

    #[test]
    fn test_currencies_never_mix() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(Currency::Gbp, dec(100));
        ledger.add(Currency::Gbp, dec(50));
        // платежи в GBP не меняют итог по EGP
        assert_eq!(ledger.snapshot().egp, Decimal::ZERO);
        assert_eq!(ledger.snapshot().gbp, dec(150));
    }

    #[test]
    fn test_merge() {
        let mut a = CurrencyLedger::new();
        a.add(Currency::Egp, dec(10));
        let mut b = CurrencyLedger::new();
        b.add(Currency::Egp, dec(5));
        b.add(Currency::Gbp, dec(7));
        a.merge(&b);
        assert_eq!(a.snapshot().egp, dec(15));
        assert_eq!(a.snapshot().gbp, dec(7));
    }

    #[test]
    fn test_minus_per_currency() {
        let mut requested = CurrencyLedger::new();
        requested.add(Currency::Egp, dec(300));
        let mut spent = CurrencyLedger::new();
        spent.add(Currency::Egp, dec(500));
        spent.add(Currency::Gbp, dec(20));
        let net = requested.minus(&spent);
        assert_eq!(net.egp, dec(-200));
        assert_eq!(net.gbp, dec(-20));
    }
}
