//! Stub coverage of the corpus
//!
//! Every bare identifier a sample uses without defining it must come from a
//! stub header. Whatever the stubs miss is reported once per identifier,
//! aggregated over the whole corpus.

use std::collections::BTreeMap;
use std::path::PathBuf;

use kcorpus_shared::types::report::{CoverageReport, Finding, FindingKind, UnresolvedIdent};
use kcorpus_shared::types::sample::Sample;
use kcorpus_shared::utils::plural;
use tracing::{debug, info};

use crate::config::CheckerConfig;
use crate::lexer::lex;
use crate::stub::StubSet;
use crate::usage::{analyze, UseStat};

/// External identifiers of one sample
#[derive(Debug, Clone)]
pub struct SampleUsage {
    pub path: PathBuf,
    pub identifiers: BTreeMap<String, UseStat>,
}

/// Analyse one sample against the stubs' known types
pub fn analyze_sample(sample: &Sample, stubs: &StubSet, config: &CheckerConfig) -> SampleUsage {
    let usage = analyze(&lex(&sample.source), stubs.known_types());

    let mut identifiers: BTreeMap<String, UseStat> = usage
        .external()
        .filter(|(name, _)| !config.is_ignored(name))
        .map(|(name, stat)| (name.clone(), stat.clone()))
        .collect();

    if config.include_tags {
        for (kind, name) in usage.external_tags() {
            let key = format!("{} {}", kind.keyword(), name);
            if !config.is_ignored(&key) {
                identifiers.entry(key).or_insert_with(|| UseStat {
                    type_use: 1,
                    ..Default::default()
                });
            }
        }
    }

    SampleUsage {
        path: sample.path.clone(),
        identifiers,
    }
}

#[derive(Debug)]
struct Aggregate {
    stat: UseStat,
    samples: usize,
    first_seen: PathBuf,
    /// Line of the first use in `first_seen`
    first_line: usize,
}

/// Accumulates per-sample usage into a corpus-wide coverage report
pub struct CoverageBuilder<'a> {
    stubs: &'a StubSet,
    config: &'a CheckerConfig,
    samples: usize,
    identifiers: BTreeMap<String, Aggregate>,
}

impl<'a> CoverageBuilder<'a> {
    pub fn new(stubs: &'a StubSet, config: &'a CheckerConfig) -> Self {
        Self {
            stubs,
            config,
            samples: 0,
            identifiers: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, sample: &Sample) {
        let usage = analyze_sample(sample, self.stubs, self.config);
        debug!(
            "{}: {}",
            usage.path.display(),
            plural(usage.identifiers.len(), "external identifier")
        );

        self.samples += 1;
        for (name, stat) in usage.identifiers {
            match self.identifiers.get_mut(&name) {
                Some(agg) => {
                    agg.samples += 1;
                    if usage.path < agg.first_seen {
                        agg.first_seen = usage.path.clone();
                        agg.first_line = stat.first_line;
                    }
                    agg.stat.merge(&stat);
                }
                None => {
                    self.identifiers.insert(
                        name,
                        Aggregate {
                            first_line: stat.first_line,
                            stat,
                            samples: 1,
                            first_seen: usage.path.clone(),
                        },
                    );
                }
            }
        }
    }

    fn provided(&self, name: &str) -> bool {
        match name.split_once(' ') {
            Some((_, tag)) => self.stubs.provides_tag(tag),
            None => self.stubs.provides(name),
        }
    }

    pub fn finish(self) -> (CoverageReport, Vec<Finding>) {
        let distinct_identifiers = self.identifiers.len();
        let mut covered = 0;
        let mut unresolved = Vec::new();

        for (name, agg) in &self.identifiers {
            if self.provided(name) {
                covered += 1;
                continue;
            }
            unresolved.push(UnresolvedIdent {
                name: name.clone(),
                usage: agg.stat.dominant(),
                occurrences: agg.stat.total(),
                samples: agg.samples,
                first_seen: agg.first_seen.clone(),
            });
        }

        unresolved.sort_by(|a, b| {
            b.samples
                .cmp(&a.samples)
                .then_with(|| b.occurrences.cmp(&a.occurrences))
                .then_with(|| a.name.cmp(&b.name))
        });

        let findings = unresolved
            .iter()
            .map(|u| {
                let line = self
                    .identifiers
                    .get(&u.name)
                    .map(|agg| agg.first_line)
                    .unwrap_or(0);
                let finding = Finding::warning(
                    FindingKind::UnresolvedIdentifier,
                    format!(
                        "'{}' ({} use) is not provided by any stub; used in {}",
                        u.name,
                        u.usage.label(),
                        plural(u.samples, "sample")
                    ),
                )
                .at(&u.first_seen);
                if line > 0 {
                    finding.line(line)
                } else {
                    finding
                }
            })
            .collect();

        let report = CoverageReport {
            stub_paths: self.stubs.paths().to_vec(),
            samples_analyzed: self.samples,
            distinct_identifiers,
            covered,
            unresolved,
        };
        info!(
            "Stub coverage: {}/{} identifiers ({:.1}%)",
            report.covered,
            report.distinct_identifiers,
            report.coverage_pct()
        );
        (report, findings)
    }
}

/// Coverage of `samples` by `stubs`
pub fn check_coverage(
    samples: &[Sample],
    stubs: &StubSet,
    config: &CheckerConfig,
) -> (CoverageReport, Vec<Finding>) {
    let mut builder = CoverageBuilder::new(stubs, config);
    for sample in samples {
        builder.add(sample);
    }
    builder.finish()
}
