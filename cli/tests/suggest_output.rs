use std::fs;
use std::process::Command;

#[test]
fn test_suggest_stdout_is_a_clean_header() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("corpus");
    fs::create_dir_all(root.join("CWE-416")).unwrap();
    fs::write(
        root.join("CWE-416/CVE-2020-0001_0_vuln.c"),
        "void f(struct page **pp)\n{\n\tput_page(*pp);\n\tkfree(*pp);\n\tif (npt_enabled)\n\t\tf(pp);\n}\n",
    )
    .unwrap();
    let stub = dir.path().join("stub.h");
    fs::write(&stub, "typedef unsigned char u8;\n").unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_kcorpus"))
        .current_dir(dir.path())
        .env("RUST_LOG", "info")
        .arg("stub")
        .arg("suggest")
        .arg(&root)
        .arg("--stub")
        .arg(&stub)
        .output()
        .unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8(out.stdout).unwrap(),
        "// Generated declarations for 3 unresolved identifier(s)\n\
         \n\
         // ===== GENERATED FUNCTIONS =====\n\
         long kfree();\n\
         long put_page();\n\
         \n\
         // ===== GENERATED GLOBAL VARIABLES =====\n\
         extern long npt_enabled;\n"
    );
    assert!(String::from_utf8_lossy(&out.stderr).contains("Found 1 C files"));
}
