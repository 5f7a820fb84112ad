//! Similarity score used to rank near misses.

/// Ratcliff/Obershelp similarity in `[0, 1]`: twice the number of matched
/// characters divided by the combined length.
///
/// Matched characters come from recursively taking the longest common
/// substring and repeating on both sides of it. Ties prefer the block that
/// starts earliest in `a`, then earliest in `b`, so the score is stable.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len().saturating_add(b.len());
    if total == 0 {
        return 1.0;
    }
    let matched = matching_characters(&a, &b);
    #[allow(clippy::cast_precision_loss)]
    let score = matched.saturating_mul(2) as f64 / total as f64;
    score
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    // Explicit work stack instead of recursion; each entry is a pair of
    // half-open ranges still to be compared.
    let mut pending = vec![(0, a.len(), 0, b.len())];
    let mut matched: usize = 0;

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched = matched.saturating_add(size);
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        let (ai, bj) = (i.saturating_add(size), j.saturating_add(size));
        if ai < ahi && bj < bhi {
            pending.push((ai, ahi, bj, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, size)`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // lengths[j] = length of the common suffix ending at a[i-1], b[j-1].
    let width = bhi.saturating_sub(blo).saturating_add(1);
    let mut previous = vec![0usize; width];
    let mut current = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let k = j.saturating_sub(blo).saturating_add(1);
            let run = if a.get(i) == b.get(j) {
                previous
                    .get(k.saturating_sub(1))
                    .copied()
                    .unwrap_or(0)
                    .saturating_add(1)
            } else {
                0
            };
            if let Some(cell) = current.get_mut(k) {
                *cell = run;
            }
            if run > best_size {
                best_size = run;
                best_i = i.saturating_add(1).saturating_sub(run);
                best_j = j.saturating_add(1).saturating_sub(run);
            }
        }
        std::mem::swap(&mut previous, &mut current);
        current.iter_mut().for_each(|c| *c = 0);
    }

    (best_i, best_j, best_size)
}
