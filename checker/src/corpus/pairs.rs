//! Vulnerable/patched pair checks

use std::collections::BTreeMap;

use kcorpus_shared::types::report::{Finding, FindingKind, PairStat};
use kcorpus_shared::types::sample::{PairKey, Sample, Variant};
use kcorpus_shared::utils::normalize_whitespace;

#[derive(Default)]
struct Halves<'a> {
    vuln: Option<&'a Sample>,
    patch: Option<&'a Sample>,
}

/// Lines added and removed going from `old` to `new`
pub fn line_changes(old: &str, new: &str) -> (usize, usize) {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    // Longest common subsequence, one row at a time
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let common = prev[b.len()];

    (b.len() - common, a.len() - common)
}

/// Pair up samples and check that the two halves of every pair differ.
/// Returns per-pair line statistics for complete pairs.
pub fn check_pairs(samples: &[Sample]) -> (Vec<PairStat>, Vec<Finding>) {
    let mut pairs: BTreeMap<PairKey, Halves> = BTreeMap::new();
    for sample in samples {
        let halves = pairs.entry(sample.name.pair_key()).or_default();
        let slot = match sample.name.variant {
            Variant::Vuln => &mut halves.vuln,
            Variant::Patch => &mut halves.patch,
        };
        slot.get_or_insert(sample);
    }

    let mut stats = Vec::new();
    let mut findings = Vec::new();

    for (key, halves) in pairs {
        let (vuln, patch) = match (halves.vuln, halves.patch) {
            (Some(v), Some(p)) => (v, p),
            (Some(only), None) | (None, Some(only)) => {
                findings.push(
                    Finding::info(
                        FindingKind::OrphanSample,
                        format!("{} has no {} counterpart", key, only.name.variant.other()),
                    )
                    .at(&only.path),
                );
                continue;
            }
            (None, None) => continue,
        };

        if vuln.source == patch.source {
            findings.push(
                Finding::error(
                    FindingKind::IdenticalPair,
                    format!("{}: vuln and patch are byte-identical", key),
                )
                .at(&vuln.path),
            );
        } else if normalize_whitespace(&vuln.source) == normalize_whitespace(&patch.source) {
            findings.push(
                Finding::warning(
                    FindingKind::WhitespaceOnlyPair,
                    format!("{}: vuln and patch differ only in whitespace", key),
                )
                .at(&vuln.path),
            );
        }

        let (lines_added, lines_removed) = line_changes(&vuln.source, &patch.source);
        stats.push(PairStat {
            key,
            lines_added,
            lines_removed,
        });
    }

    (stats, findings)
}
