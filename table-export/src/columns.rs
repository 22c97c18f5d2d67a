use harvest_core::CanonicalRecord;

/// How many leading records inform the column set by default.
pub const DEFAULT_SAMPLE_SIZE: usize = 2;

/// Which records decide the output columns.
///
/// `Sample(n)` looks at the first `n` records only: fields that first appear
/// later in the sequence get no column and their values are dropped.
/// `Full` looks at every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPolicy {
    Sample(usize),
    Full,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        ColumnPolicy::Sample(DEFAULT_SAMPLE_SIZE)
    }
}

impl ColumnPolicy {
    /// Config-style sample size where 0 means every record.
    pub fn from_sample_size(size: usize) -> Self {
        match size {
            0 => ColumnPolicy::Full,
            n => ColumnPolicy::Sample(n),
        }
    }

    fn sampled<'a>(&self, records: &'a [CanonicalRecord]) -> &'a [CanonicalRecord] {
        match *self {
            ColumnPolicy::Sample(n) => &records[..n.min(records.len())],
            ColumnPolicy::Full => records,
        }
    }

    /// Union of the sampled records' field names, in first-seen order.
    pub fn infer(&self, records: &[CanonicalRecord]) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = Vec::new();
        for name in self.sampled(records).iter().flat_map(|r| r.field_names()) {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::{RecordType, RetrieveTime};

    fn record(fields: &[&'static str]) -> CanonicalRecord {
        fields
            .iter()
            .fold(CanonicalRecord::builder(RecordType::Comment, "p"), |b, f| {
                b.field(*f, "x")
            })
            .build(&RetrieveTime::now())
    }

    #[test]
    fn test_default_samples_two_records() {
        assert_eq!(ColumnPolicy::default(), ColumnPolicy::Sample(2));
        assert_eq!(ColumnPolicy::from_sample_size(0), ColumnPolicy::Full);
        assert_eq!(ColumnPolicy::from_sample_size(5), ColumnPolicy::Sample(5));
    }

    #[test]
    fn test_first_seen_order_across_sample() {
        let records = vec![record(&["id", "body"]), record(&["id", "title"]), record(&["id", "gilded"])];

        let columns = ColumnPolicy::default().infer(&records);
        assert_eq!(
            columns,
            vec!["id", "body", "type", "submission_id", "retrieve_time", "title"]
        );

        let all = ColumnPolicy::Full.infer(&records);
        assert_eq!(all.last(), Some(&"gilded"));
    }

    #[test]
    fn test_sample_larger_than_input() {
        let records = vec![record(&["id"])];
        assert_eq!(ColumnPolicy::Sample(10).infer(&records).len(), 4);
        assert!(ColumnPolicy::Sample(0).infer(&records).is_empty());
    }
}
