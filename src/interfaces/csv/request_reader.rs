use crate::domain::payment::PaymentRequest;
use crate::error::{PaymentError, Result};
use std::io::Read;

/// Payment requests parsed from CSV rows.
///
/// Columns are `amount, currency, method, idempotency_key`. Rows may omit the
/// key column, and blank keys read as "no key". Field values are trimmed.
/// Amounts are only parsed here; positivity is checked at submission.
pub struct RequestReader<R: Read> {
    rows: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let rows = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { rows }
    }

    /// One item per data row; a bad row yields `CsvError` and reading goes on.
    pub fn requests(self) -> impl Iterator<Item = Result<PaymentRequest>> {
        self.rows
            .into_deserialize::<PaymentRequest>()
            .map(|row| row.map_err(PaymentError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "amount, currency, method, idempotency_key\n10.50, USD, stripe, order-1\n3, EUR, PayPal,";
        let reader = RequestReader::new(data.as_bytes());
        let results: Vec<Result<PaymentRequest>> = reader.requests().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.amount, dec!(10.50));
        assert_eq!(first.idempotency_key.as_deref(), Some("order-1"));

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.method, "PayPal");
        assert_eq!(second.idempotency_key, None);
    }

    #[test]
    fn test_reader_missing_key_column() {
        let data = "amount, currency, method\n1.0, USD, stripe";
        let reader = RequestReader::new(data.as_bytes());
        let results: Vec<Result<PaymentRequest>> = reader.requests().collect();

        assert_eq!(results[0].as_ref().unwrap().idempotency_key, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "amount, currency, method, idempotency_key\nnot_a_number, USD, stripe,";
        let reader = RequestReader::new(data.as_bytes());
        let results: Vec<Result<PaymentRequest>> = reader.requests().collect();

        assert!(matches!(results[0], Err(PaymentError::CsvError(_))));
    }

    #[test]
    fn test_reader_continues_after_bad_row() {
        let data = "amount, currency, method, idempotency_key\nx, USD, stripe,\n2, USD, paypal, k-2";
        let results: Vec<Result<PaymentRequest>> =
            RequestReader::new(data.as_bytes()).requests().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(
            results[1].as_ref().unwrap().idempotency_key.as_deref(),
            Some("k-2")
        );
    }
}
