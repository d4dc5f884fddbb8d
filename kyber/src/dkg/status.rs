//! Per dealer, per share holder bookkeeping of the verdicts seen so far.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::structs::{Index, Status};

/// Statuses indexed by dealer, then by share holder.
///
/// There is one row per dealer of the old group and one column per holder of the new group. Nodes
/// that only leave the group have no column, so they are never counted as missing holders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatrix {
    rows: BTreeMap<Index, BTreeMap<Index, Status>>,
}

impl StatusMatrix {
    /// A matrix with every entry set to `default`.
    pub fn new(dealers: impl IntoIterator<Item = Index>, holders: &[Index], default: Status) -> Self {
        let row: BTreeMap<_, _> = holders.iter().map(|h| (*h, default)).collect();
        Self { rows: dealers.into_iter().map(|d| (d, row.clone())).collect() }
    }

    /// Records the verdict of `holder` on `dealer`; unknown pairs are ignored.
    pub fn set(&mut self, dealer: Index, holder: Index, status: Status) {
        if let Some(entry) = self.rows.get_mut(&dealer).and_then(|row| row.get_mut(&holder)) {
            *entry = status;
        }
    }

    /// Sets the whole row of `dealer`.
    pub fn set_all(&mut self, dealer: Index, status: Status) {
        if let Some(row) = self.rows.get_mut(&dealer) {
            row.values_mut().for_each(|s| *s = status);
        }
    }

    pub fn get(&self, dealer: Index, holder: Index) -> Option<Status> {
        self.rows.get(&dealer).and_then(|row| row.get(&holder)).copied()
    }

    /// Verdicts of every holder on `dealer`.
    pub fn statuses_of_dealer(&self, dealer: Index) -> Option<&BTreeMap<Index, Status>> {
        self.rows.get(&dealer)
    }

    /// Verdicts of `holder` on every dealer.
    pub fn statuses_for_share(&self, holder: Index) -> BTreeMap<Index, Status> {
        self.rows.iter().filter_map(|(d, row)| row.get(&holder).map(|s| (*d, *s))).collect()
    }

    /// Whether every holder outside `excluded` approved `dealer`.
    pub fn all_true_except(&self, dealer: Index, excluded: &BTreeSet<Index>) -> bool {
        self.rows
            .get(&dealer)
            .map(|row| row.iter().filter(|(h, _)| !excluded.contains(*h)).all(|(_, s)| s.is_success()))
            .unwrap_or(false)
    }

    pub fn all_true(&self, dealer: Index) -> bool {
        self.all_true_except(dealer, &BTreeSet::new())
    }

    /// Number of complaints against `dealer`, ignoring the holders in `excluded`.
    pub fn complaints_except(&self, dealer: Index, excluded: &BTreeSet<Index>) -> usize {
        self.rows
            .get(&dealer)
            .map(|row| row.iter().filter(|(h, s)| !excluded.contains(*h) && !s.is_success()).count())
            .unwrap_or(0)
    }

    /// Whether every entry is a success once the given dealers and holders are left out.
    pub fn complete_success_except(&self, dealers: &BTreeSet<Index>, holders: &BTreeSet<Index>) -> bool {
        self.rows.keys().filter(|d| !dealers.contains(*d)).all(|d| self.all_true_except(*d, holders))
    }

    pub fn complete_success(&self) -> bool {
        self.complete_success_except(&BTreeSet::new(), &BTreeSet::new())
    }

    pub fn dealers(&self) -> impl Iterator<Item = Index> + '_ {
        self.rows.keys().copied()
    }
}

impl fmt::Display for StatusMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (dealer, row) in &self.rows {
            write!(f, "dealer {dealer}: [")?;
            for (i, (holder, status)) in row.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                let mark = if status.is_success() { '1' } else { '0' };
                write!(f, "{holder}:{mark}")?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(indices: &[Index]) -> BTreeSet<Index> {
        indices.iter().copied().collect()
    }

    #[test]
    fn defaults_and_updates() {
        let mut m = StatusMatrix::new(0..3, &[0, 1, 2, 3], Status::Complaint);
        assert!(!m.complete_success());
        for d in 0..3 {
            for h in 0..4 {
                m.set(d, h, Status::Success);
            }
        }
        assert!(m.complete_success());

        m.set(1, 2, Status::Complaint);
        assert_eq!(m.get(1, 2), Some(Status::Complaint));
        assert!(!m.all_true(1));
        assert!(m.all_true(0));
        assert_eq!(m.statuses_for_share(2)[&1], Status::Complaint);
        assert_eq!(m.statuses_for_share(2).len(), 3);
    }

    #[test]
    fn out_of_matrix_entries_are_ignored() {
        let mut m = StatusMatrix::new([0, 1], &[0, 1], Status::Success);
        m.set(5, 0, Status::Complaint);
        m.set(0, 5, Status::Complaint);
        assert!(m.complete_success());
        assert_eq!(m.get(5, 0), None);
        assert!(!m.all_true(5));
    }

    #[test]
    fn exclusions() {
        let mut m = StatusMatrix::new(0..4, &[0, 1, 2, 3], Status::Success);
        m.set(0, 3, Status::Complaint);
        m.set(2, 3, Status::Complaint);
        m.set(2, 1, Status::Complaint);

        assert!(!m.complete_success());
        assert!(m.all_true_except(0, &set(&[3])));
        assert!(!m.complete_success_except(&set(&[]), &set(&[3])));
        assert!(m.complete_success_except(&set(&[2]), &set(&[3])));
        assert_eq!(m.complaints_except(2, &set(&[])), 2);
        assert_eq!(m.complaints_except(2, &set(&[3])), 1);

        m.set_all(1, Status::Complaint);
        assert_eq!(m.complaints_except(1, &set(&[])), 4);
        assert_eq!(m.dealers().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn display_lists_every_row() {
        let mut m = StatusMatrix::new([0, 1], &[0, 1], Status::Success);
        m.set(1, 0, Status::Complaint);
        assert_eq!(m.to_string(), "dealer 0: [0:1, 1:1]\ndealer 1: [0:0, 1:1]\n");
    }
}
