//! Sequence similarity used by the fuzzy resolvers

/// Longest-common-subsequence ratio in `[0, 1]`, case-insensitive:
/// `2·LCS(a, b) / (|a| + |b|)`.
pub fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().flat_map(|c| c.to_lowercase()).collect();
    let b: Vec<char> = b.chars().flat_map(|c| c.to_lowercase()).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Two-row DP over the shorter string
    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for &lc in long.iter() {
        for (j, &sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[short.len()];
    (2.0 * lcs as f64) / ((a.len() + b.len()) as f64)
}

/// Comparison variants of a source name: as-is, dehyphenated, deunderscored,
/// and both. Deduplicated, original first.
pub fn name_variants(source: &str) -> Vec<String> {
    let mut variants = vec![source.to_string()];
    for candidate in [
        source.replace('-', ""),
        source.replace('_', ""),
        source.replace(['-', '_'], ""),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Best LCS ratio of any source variant against the candidate identifier,
/// compared against both the full `<library>:<name>` form and the bare name.
pub fn best_ratio(source: &str, candidate: &str) -> f64 {
    let bare = candidate.rsplit(':').next().unwrap_or(candidate);
    let mut best: f64 = 0.0;
    for variant in name_variants(source) {
        best = best.max(lcs_ratio(&variant, candidate));
        best = best.max(lcs_ratio(&variant, bare));
    }
    best
}
