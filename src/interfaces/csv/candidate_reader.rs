use crate::domain::candidate::Candidate;
use crate::error::{Result, UssdError};
use std::io::Read;

/// Reads the candidate list from a CSV source with headers `id,name,code,active`.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Candidate>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CandidateReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CandidateReader<R> {
    /// Creates a new `CandidateReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn candidates(self) -> impl Iterator<Item = Result<Candidate>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(UssdError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "id, name, code, active\n1, Elikem Group, 013, true\n2, Retired Troupe, 099, false";
        let reader = CandidateReader::new(data.as_bytes());
        let results: Vec<Result<Candidate>> = reader.candidates().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.name, "Elikem Group");
        assert_eq!(first.code, "013");
        assert!(first.is_active);
        assert!(!results[1].as_ref().unwrap().is_active);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "id, name, code, active\nabc, Elikem Group, 013, true";
        let reader = CandidateReader::new(data.as_bytes());
        let results: Vec<Result<Candidate>> = reader.candidates().collect();

        assert!(matches!(results[0], Err(UssdError::CsvError(_))));
    }
}
