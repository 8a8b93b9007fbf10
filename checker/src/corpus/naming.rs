//! File name versus content consistency
//!
//! A sample's CVE and CWE come from its path. When the file opens with a
//! comment naming a CVE or CWE, the two must agree. Across layouts, one CVE
//! should be filed under a single CWE.

use std::collections::{BTreeMap, BTreeSet};

use kcorpus_shared::types::report::{Finding, FindingKind};
use kcorpus_shared::types::sample::{CveId, CweId, Sample};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexer::lex;

static CVE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bCVE[-_](\d{4})[-_](\d{4,})\b").expect("invalid CVE reference regex")
});

static CWE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCWE[-_ ]?(\d+)\b").expect("invalid CWE reference regex"));

/// CVE and CWE identifiers mentioned in some text, in order of appearance
pub fn references(text: &str) -> (Vec<CveId>, Vec<CweId>) {
    let cves = CVE_REF_RE
        .captures_iter(text)
        .filter_map(|c| format!("CVE-{}-{}", &c[1], &c[2]).parse().ok())
        .collect();
    let cwes = CWE_REF_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    (cves, cwes)
}

fn check_sample(sample: &Sample, out: &mut Vec<Finding>) {
    if let (Some(prefix), Some(dir)) = (sample.name.prefix_cwe, sample.name.cwe) {
        out.push(
            Finding::error(
                FindingKind::CweMismatch,
                format!(
                    "{} is filed under {} but its file name says {}",
                    sample.name.cve, dir, prefix
                ),
            )
            .at(&sample.path),
        );
    }

    let lexed = lex(&sample.source);
    let comments = lexed.leading_comments();
    if comments.is_empty() {
        return;
    }
    let text: String = comments.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
    let line = comments[0].line;
    let (cves, cwes) = references(&text);

    if !cves.is_empty() && !cves.contains(&sample.name.cve) {
        out.push(
            Finding::error(
                FindingKind::CveMismatch,
                format!(
                    "file name says {} but the leading comment names {}",
                    sample.name.cve, cves[0]
                ),
            )
            .at(&sample.path)
            .line(line),
        );
    }

    if let Some(cwe) = sample.name.cwe {
        if !cwes.is_empty() && !cwes.contains(&cwe) {
            out.push(
                Finding::error(
                    FindingKind::CweMismatch,
                    format!(
                        "{} is filed under {} but the leading comment names {}",
                        sample.name.cve, cwe, cwes[0]
                    ),
                )
                .at(&sample.path)
                .line(line),
            );
        }
    }
}

/// Compare every sample's path identity with its leading comment
pub fn check_names(samples: &[Sample]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for sample in samples {
        check_sample(sample, &mut findings);
    }
    findings
}

/// One CVE filed under different CWEs in different places
pub fn check_cwe_agreement(samples: &[Sample]) -> Vec<Finding> {
    let mut by_cve: BTreeMap<CveId, BTreeMap<CweId, BTreeSet<&'static str>>> = BTreeMap::new();
    for sample in samples {
        if let Some(cwe) = sample.name.cwe {
            by_cve
                .entry(sample.name.cve)
                .or_default()
                .entry(cwe)
                .or_default()
                .insert(sample.name.layout.label());
        }
    }

    by_cve
        .into_iter()
        .filter(|(_, cwes)| cwes.len() > 1)
        .map(|(cve, cwes)| {
            let listed: Vec<String> = cwes
                .iter()
                .map(|(cwe, layouts)| {
                    format!("{} ({})", cwe, layouts.iter().copied().collect::<Vec<_>>().join(", "))
                })
                .collect();
            Finding::warning(
                FindingKind::CweDisagreement,
                format!("{} is classified as {}", cve, listed.join(" and ")),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcorpus_shared::types::sample::SampleName;
    use std::path::PathBuf;

    fn sample(path: &str, source: &str) -> Sample {
        let path = PathBuf::from(path);
        let name = SampleName::parse(&path).unwrap();
        Sample::new(path, name, source.to_string())
    }

    #[test]
    fn test_references() {
        let (cves, cwes) = references("Fix for CVE-2019-15505 (cwe_416), see also CVE_2020_0001");
        assert_eq!(cves.len(), 2);
        assert_eq!(cves[0].to_string(), "CVE-2019-15505");
        assert_eq!(cves[1].to_string(), "CVE-2020-0001");
        assert_eq!(cwes, vec![CweId(416)]);
    }

    #[test]
    fn test_no_leading_comment_is_skipped() {
        let s = sample(
            "data/tmp/temp_code_files/CWE-416/CVE-2014-2568_0_patch.c",
            "int f(void) { /* CVE-2000-0001 */ return 0; }\n",
        );
        assert!(check_names(&[s]).is_empty());
    }

    #[test]
    fn test_matching_comment() {
        let s = sample(
            "data/tmp/temp_code_files/CWE-416/CVE-2014-2568_0_patch.c",
            "/* CVE-2014-2568: use-after-free (CWE-416) */\nint f(void) { return 0; }\n",
        );
        assert!(check_names(&[s]).is_empty());
    }

    #[test]
    fn test_mismatching_comment() {
        let s = sample(
            "data/tmp/temp_code_files/CWE-416/CVE-2014-2568_0_vuln.c",
            "// CVE-2014-2569\n// CWE-787 out-of-bounds write\nint f(void) { return 0; }\n",
        );
        let findings = check_names(&[s]);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, FindingKind::CveMismatch);
        assert_eq!(findings[0].line, Some(1));
        assert!(findings[0].message.contains("CVE-2014-2569"));
        assert_eq!(findings[1].kind, FindingKind::CweMismatch);
    }

    #[test]
    fn test_cwe_prefix_against_directory() {
        let agreeing = sample(
            "data/tmp/temp_code_files/CWE-416/CWE-416_CVE-2020-29660_1_vuln.c",
            "/* CVE-2020-29660 */\nint f(void) { return 0; }\n",
        );
        assert!(check_names(&[agreeing]).is_empty());

        let misfiled = sample(
            "data/tmp/temp_code_files/CWE-416/CWE-787_CVE-2020-29660_1_vuln.c",
            "int f(void) { return 0; }\n",
        );
        let findings = check_names(&[misfiled]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::CweMismatch);
        assert_eq!(findings[0].line, None);
        assert_eq!(
            findings[0].message,
            "CVE-2020-29660 is filed under CWE-416 but its file name says CWE-787"
        );
    }

    #[test]
    fn test_instance_samples_have_no_cwe_to_check() {
        let s = sample(
            "data/tmp/instances/CVE-2019-15505_0/vuln.c",
            "/* CVE-2019-15505, CWE-125 */\nint f(void) { return 0; }\n",
        );
        assert!(check_names(&[s]).is_empty());
    }

    #[test]
    fn test_cwe_disagreement() {
        let samples = vec![
            sample(
                "data/datasets/test_c_files/CWE-CSV/CVE_2013_0871_162_Linux_Kernel_CWE_362_Testset_c5405f79_p_patch.c",
                "",
            ),
            sample("data/tmp/temp_code_files/CWE-416/CVE-2013-0871_0_patch.c", ""),
            sample("data/tmp/temp_code_files/CWE-416/CVE-2014-2568_0_patch.c", ""),
        ];
        let findings = check_cwe_agreement(&samples);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::CweDisagreement);
        assert_eq!(
            findings[0].message,
            "CVE-2013-0871 is classified as CWE-362 (testset) and CWE-416 (temp_code_files)"
        );
    }
}
