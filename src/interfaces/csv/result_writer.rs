use crate::domain::payment::PaymentResult;
use crate::error::Result;
use std::io::Write;

/// Writes payment results as CSV rows: `payment_id,status,message`.
pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_results<I>(&mut self, results: I) -> Result<()>
    where
        I: IntoIterator<Item = PaymentResult>,
    {
        for result in results {
            self.writer.serialize(result)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
