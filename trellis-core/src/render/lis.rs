//! Longest increasing subsequence over the keyed-diff source map.

use smallvec::SmallVec;

/// Positions of one longest strictly increasing subsequence of `source`,
/// ignoring `None` entries.
///
/// The keyed diff keeps the nodes at these positions in place and moves
/// every other reused node.
pub fn longest_increasing_subsequence(source: &[Option<usize>]) -> SmallVec<[usize; 16]> {
    let mut predecessor = vec![usize::MAX; source.len()];
    let mut result: SmallVec<[usize; 16]> = SmallVec::new();

    let value_at = |i: usize| source[i].unwrap_or(usize::MAX);

    for (i, entry) in source.iter().enumerate() {
        let Some(value) = *entry else {
            continue;
        };

        match result.last() {
            None => {
                result.push(i);
                continue;
            }
            Some(&last) if value_at(last) < value => {
                predecessor[i] = last;
                result.push(i);
                continue;
            }
            Some(_) => {}
        }

        // First slot whose tail value is >= value.
        let (mut lo, mut hi) = (0, result.len() - 1);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if value_at(result[mid]) < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if value < value_at(result[lo]) {
            if lo > 0 {
                predecessor[i] = result[lo - 1];
            }
            result[lo] = i;
        }
    }

    let Some(&last) = result.last() else {
        return result;
    };
    let mut cursor = last;
    for slot in result.iter_mut().rev() {
        *slot = cursor;
        cursor = predecessor[cursor];
    }
    result
}
