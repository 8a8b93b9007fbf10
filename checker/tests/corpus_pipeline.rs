use anyhow::Result;
use kcorpus_checker::corpus::scan;
use kcorpus_checker::output::write_json;
use kcorpus_checker::{run_check, CheckerConfig};
use kcorpus_shared::types::report::{CheckReport, FindingKind, Severity};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STUB: &str = "\
// ===== BASIC TYPES =====
typedef unsigned char u8;
#define NULL ((void*)0)

// ===== FORWARD DECLARATIONS =====
struct sk_buff;
void kfree_skb(struct sk_buff *skb);
";

const VULN: &str = "\
static int f(struct sk_buff *skb)
{
\tkfree_skb(skb);
\treturn skb_linearize(skb);
}
";

const PATCH: &str = "\
static int f(struct sk_buff *skb)
{
\tif (!skb)
\t\treturn 0;
\tkfree_skb(skb);
\treturn skb_linearize(skb);
}
";

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn build_corpus() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let testset = "data/datasets/test_c_files/CWE-CSV";
    write(
        root,
        &format!("{}/CVE_2013_0871_162_Linux_Kernel_CWE_362_Testset_c5405f79_v_vuln.c", testset),
        VULN,
    );
    write(
        root,
        &format!("{}/CVE_2013_0871_162_Linux_Kernel_CWE_362_Testset_c5405f79_p_patch.c", testset),
        PATCH,
    );

    let same = "int g(u8 *buf) { return buf[0]; }\n";
    write(root, "data/tmp/instances/CVE-2019-15505_0/vuln.c", same);
    write(root, "data/tmp/instances/CVE-2019-15505_0/patch.c", same);

    write(root, "data/tmp/temp_code_files/CWE-416/CVE-2013-0871_0_vuln.c", VULN);
    write(
        root,
        "data/tmp/temp_code_files/CWE-416/CVE-2014-2568_0_patch.c",
        "/* CVE-2014-9999 */\nint h(void) { return 0; }\n",
    );
    write(root, "data/tmp/temp_code_files/CWE-416/notes.c", "int x;\n");

    let stub = write(root, "KB_building/config/kernel_stub.h", STUB);
    (dir, stub)
}

fn config(stub: PathBuf) -> CheckerConfig {
    CheckerConfig {
        stub_paths: vec![stub],
        max_concurrency: 2,
        ..Default::default()
    }
}

fn kinds(report: &CheckReport) -> Vec<FindingKind> {
    report.findings.iter().map(|f| f.kind).collect()
}

#[tokio::test]
async fn test_scan_inventory() -> Result<()> {
    let (dir, stub) = build_corpus();
    let corpus = scan(dir.path(), &config(stub)).await?;

    assert_eq!(corpus.len(), 6);
    assert_eq!(corpus.findings.len(), 1);
    assert_eq!(corpus.findings[0].kind, FindingKind::UnparsedName);

    let inv = corpus.inventory();
    assert_eq!(inv.total, 6);
    assert_eq!(inv.by_layout["testset"], 2);
    assert_eq!(inv.by_layout["instances"], 2);
    assert_eq!(inv.by_layout["temp_code_files"], 2);
    assert_eq!(inv.by_cwe["CWE-416"], 2);
    assert_eq!(inv.by_cwe["unknown"], 2);
    assert_eq!((inv.vuln, inv.patch), (3, 3));
    assert_eq!(inv.complete_pairs, 2);
    assert_eq!(inv.distinct_cves, 3);
    Ok(())
}

#[tokio::test]
async fn test_full_check() -> Result<()> {
    let (dir, stub) = build_corpus();
    let report = run_check(dir.path(), &config(stub)).await?;

    assert!(report.has_errors());
    let kinds = kinds(&report);
    for expected in [
        FindingKind::UnparsedName,
        FindingKind::CveMismatch,
        FindingKind::CweDisagreement,
        FindingKind::IdenticalPair,
        FindingKind::OrphanSample,
        FindingKind::UnresolvedIdentifier,
    ] {
        assert!(kinds.contains(&expected), "missing {:?}", expected);
    }
    assert!(!kinds.contains(&FindingKind::WhitespaceOnlyPair));

    // errors first
    assert_eq!(report.findings[0].severity, Severity::Error);

    assert_eq!(report.pairs.len(), 2);
    let testset_pair = report
        .pairs
        .iter()
        .find(|p| !p.is_unchanged())
        .expect("testset pair differs");
    assert_eq!((testset_pair.lines_added, testset_pair.lines_removed), (2, 0));

    let coverage = report.coverage.as_ref().expect("coverage computed");
    assert_eq!(coverage.samples_analyzed, 6);
    let unresolved: Vec<&str> = coverage.unresolved.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(unresolved, vec!["skb_linearize"]);
    assert_eq!(coverage.unresolved[0].samples, 3);

    // CWE disagreement and the orphaned temp code sample
    assert_eq!(report.findings_for("CVE-2013-0871".parse()?).len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_min_severity_filter() -> Result<()> {
    let (dir, stub) = build_corpus();
    let config = CheckerConfig {
        min_severity: Severity::Error,
        ..config(stub)
    };
    let report = run_check(dir.path(), &config).await?;

    assert_eq!(report.error_count(), 2);
    assert_eq!(report.summary.warnings, 0);
    assert!(report.findings.iter().all(|f| f.severity == Severity::Error));
    Ok(())
}

#[tokio::test]
async fn test_report_round_trips_through_json() -> Result<()> {
    let (dir, stub) = build_corpus();
    let report = run_check(dir.path(), &config(stub)).await?;

    let out = dir.path().join("report.json");
    write_json(&report, &out)?;
    let parsed: CheckReport = serde_json::from_str(&fs::read_to_string(&out)?)?;
    assert_eq!(parsed.findings, report.findings);
    assert_eq!(parsed.inventory, report.inventory);
    Ok(())
}

#[tokio::test]
async fn test_flat_directory_and_no_stubs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "CWE-787/CVE-2020-0001_0_vuln.c", "int a;\n");
    write(dir.path(), "CWE-787/CVE-2020-0001_0_patch.c", "int b;\n");

    let report = run_check(dir.path(), &CheckerConfig::default()).await?;
    assert_eq!(report.inventory.total, 2);
    assert_eq!(report.inventory.complete_pairs, 1);
    assert!(report.coverage.is_none());
    assert!(report.findings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_root() {
    let result = run_check(Path::new("/nonexistent/corpus"), &CheckerConfig::default()).await;
    assert!(result.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_sample_is_reported() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "CWE-787/CVE-2020-0001_0_vuln.c", "int a;\n");
    std::os::unix::fs::symlink(
        dir.path().join("missing.c"),
        dir.path().join("CWE-787/CVE-2020-0001_0_patch.c"),
    )?;

    let report = run_check(dir.path(), &CheckerConfig::default()).await?;
    assert_eq!(report.inventory.total, 1);
    let unreadable: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.kind == FindingKind::UnreadableSample)
        .collect();
    assert_eq!(unreadable.len(), 1);
    assert_eq!(unreadable[0].severity, Severity::Warning);
    assert!(unreadable[0]
        .path
        .as_deref()
        .is_some_and(|p| p.ends_with("CVE-2020-0001_0_patch.c")));
    assert!(unreadable[0].message.contains("CVE-2020-0001 patch"));
    Ok(())
}

#[tokio::test]
async fn test_cwe_prefixed_temp_code_files_are_samples() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let temp = "data/tmp/temp_code_files";
    write(dir.path(), &format!("{}/CWE-416/CWE-416_CVE-2020-29660_1_vuln.c", temp), "int a;\n");
    write(dir.path(), &format!("{}/CWE-416/CWE-416_CVE-2020-29660_1_patch.c", temp), "int b;\n");
    write(dir.path(), &format!("{}/CWE-416/CWE-362_CVE-2021-0920_0_vuln.c", temp), "int c;\n");

    let report = run_check(dir.path(), &CheckerConfig::default()).await?;
    assert_eq!(report.inventory.total, 3);
    assert_eq!(report.inventory.complete_pairs, 1);
    let kinds = kinds(&report);
    assert!(!kinds.contains(&FindingKind::UnparsedName));
    assert_eq!(
        kinds.iter().filter(|k| **k == FindingKind::CweMismatch).count(),
        1
    );
    Ok(())
}
