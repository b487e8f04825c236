use std::cmp::Ordering;
use std::iter::Zip;
use std::time::Instant;

use itertools::Itertools;

pub mod sequence {
    pub use super::{top_k_indices_sorted, zip_eq_exact};
}

/// Zip two iterators, asserting that they have the same length.
///
/// Used throughout `mcts-core` to pair up priors with child slots and
/// per-child visit tallies with children, where a length mismatch would
/// indicate a bug in the caller rather than a recoverable condition.
pub fn zip_eq_exact<L, R, LI, RI>(left: L, right: R) -> Zip<LI, RI>
where
    L: IntoIterator<IntoIter = LI>,
    R: IntoIterator<IntoIter = RI>,
    LI: ExactSizeIterator,
    RI: ExactSizeIterator,
{
    let left = left.into_iter();
    let right = right.into_iter();
    assert_eq!(left.len(), right.len(), "Both iterators must have the same length");
    left.zip(right)
}

/// Get the indices of the highest `k` values, sorted from high to low.
/// `NaN` values are allowed but considered higher than any other value, to
/// ensure they don't go unnoticed.
pub fn top_k_indices_sorted(values: &[f32], k: usize) -> Vec<usize> {
    fn compare(a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b);
        let eq = a == b || (a.is_nan() && b.is_nan());
        let first_nan = a.is_nan();

        match (ord, eq, first_nan) {
            (Some(ord), _, _) => ord,
            (None, true, _) => Ordering::Equal,
            (None, false, true) => Ordering::Greater,
            (None, false, false) => Ordering::Less,
        }
    }

    let compare_index = |&i: &usize, &j: &usize| compare(values[i], values[j]).reverse();

    let n = values.len();
    let mut result = (0..n).collect_vec();
    if k < n {
        result.select_nth_unstable_by(k, compare_index);
        result.truncate(k);
    }
    result.sort_by(compare_index);

    result
}

/// Rolling throughput printer, used by long-running batchlet loops to report
/// leaves/sec without pulling a metrics crate into this small a workspace.
#[derive(Debug)]
pub struct PrintThroughput {
    name: String,
    total_count: u64,
    delta_count: u64,
    update_count: u64,
    last_print: Instant,
}

impl PrintThroughput {
    pub fn new(name: &str) -> Self {
        PrintThroughput {
            name: name.to_owned(),
            total_count: 0,
            delta_count: 0,
            update_count: 0,
            last_print: Instant::now(),
        }
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn update_delta(&mut self, count: u64) -> bool {
        self.delta_count += count;
        self.total_count += count;
        self.update_count += 1;

        let now = Instant::now();
        let delta = now - self.last_print;

        let print = delta.as_secs() >= 1 && self.update_count >= 10;
        if print {
            self.print_tp(now);
        }
        print
    }

    fn print_tp(&mut self, now: Instant) {
        let delta = now - self.last_print;
        let throughput = self.delta_count as f32 / delta.as_secs_f32();
        println!(
            "{:.3} {}/s => {:.3} {}",
            throughput, self.name, self.total_count, self.name
        );

        self.last_print = now;
        self.delta_count = 0;
        self.update_count = 0;
    }
}

impl Drop for PrintThroughput {
    fn drop(&mut self) {
        self.print_tp(Instant::now());
    }
}
