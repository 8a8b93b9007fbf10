//! Stub header self-consistency checks

use std::collections::{BTreeMap, HashMap, HashSet};

use kcorpus_shared::types::report::{Finding, FindingKind};
use kcorpus_shared::types::stub::{StubSymbol, SymbolKind, TagDecl, TagKind};

use super::StubHeader;

fn duplicate_tags(tags: &[TagDecl], out: &mut Vec<Finding>) {
    let mut first_def: HashMap<&str, &TagDecl> = HashMap::new();
    let mut first_kind: HashMap<&str, &TagDecl> = HashMap::new();

    for tag in tags {
        match first_kind.get(tag.name.as_str()) {
            Some(prev) if prev.kind != tag.kind => {
                out.push(
                    Finding::error(
                        FindingKind::TagKindMismatch,
                        format!(
                            "'{} {}' was declared as '{} {}' at line {}",
                            tag.kind.keyword(),
                            tag.name,
                            prev.kind.keyword(),
                            prev.name,
                            prev.line
                        ),
                    )
                    .line(tag.line),
                );
            }
            Some(_) => {}
            None => {
                first_kind.insert(&tag.name, tag);
            }
        }

        if !tag.defined {
            continue;
        }
        if let Some(prev) = first_def.get(tag.name.as_str()) {
            out.push(
                Finding::error(
                    FindingKind::DuplicateTagDefinition,
                    format!(
                        "'{} {}' is defined again (first definition at line {})",
                        tag.kind.keyword(),
                        tag.name,
                        prev.line
                    ),
                )
                .line(tag.line),
            );
        } else {
            first_def.insert(&tag.name, tag);
        }
    }
}

fn incomplete_members(tags: &[TagDecl], out: &mut Vec<Finding>) {
    let mut defined_at: HashMap<(TagKind, &str), usize> = HashMap::new();
    for tag in tags.iter().filter(|t| t.defined) {
        defined_at.entry((tag.kind, tag.name.as_str())).or_insert(tag.line);
    }

    for tag in tags.iter().filter(|t| t.defined) {
        let mut seen: HashSet<(TagKind, &str)> = HashSet::new();
        for (kind, member) in &tag.by_value_members {
            if !seen.insert((*kind, member.as_str())) {
                continue;
            }
            let message = match defined_at.get(&(*kind, member.as_str())) {
                Some(line) if *line < tag.line => continue,
                Some(line) => format!(
                    "'{} {}' embeds '{} {}' by value before its definition at line {}",
                    tag.kind.keyword(),
                    tag.name,
                    kind.keyword(),
                    member,
                    line
                ),
                None => format!(
                    "'{} {}' embeds '{} {}' by value but it is never defined",
                    tag.kind.keyword(),
                    tag.name,
                    kind.keyword(),
                    member
                ),
            };
            out.push(Finding::warning(FindingKind::IncompleteMember, message).line(tag.line));
        }
    }
}

fn redefinitions(symbols: &[StubSymbol], out: &mut Vec<Finding>) {
    let mut macros: HashMap<&str, &StubSymbol> = HashMap::new();
    let mut typedefs: HashMap<&str, &StubSymbol> = HashMap::new();

    for sym in symbols {
        if sym.kind.is_macro() {
            match macros.get(sym.name.as_str()) {
                Some(prev) if prev.kind == sym.kind && prev.detail == sym.detail => {
                    out.push(
                        Finding::warning(
                            FindingKind::MacroRedefinition,
                            format!(
                                "macro '{}' is defined again with the same body (first at line {})",
                                sym.name, prev.line
                            ),
                        )
                        .line(sym.line),
                    );
                }
                Some(prev) => {
                    out.push(
                        Finding::error(
                            FindingKind::MacroRedefinition,
                            format!(
                                "macro '{}' is redefined as '{}' (was '{}' at line {})",
                                sym.name, sym.detail, prev.detail, prev.line
                            ),
                        )
                        .line(sym.line),
                    );
                }
                None => {
                    macros.insert(&sym.name, sym);
                }
            }
        } else if sym.kind == SymbolKind::Typedef {
            match typedefs.get(sym.name.as_str()) {
                Some(prev) if prev.detail != sym.detail => {
                    out.push(
                        Finding::error(
                            FindingKind::TypedefConflict,
                            format!(
                                "typedef '{}' is bound to '{}' but was '{}' at line {}",
                                sym.name, sym.detail, prev.detail, prev.line
                            ),
                        )
                        .line(sym.line),
                    );
                }
                Some(_) => {}
                None => {
                    typedefs.insert(&sym.name, sym);
                }
            }
        }
    }
}

/// A function-like macro expands over every call of a same-named function
fn shadowed_declarations(symbols: &[StubSymbol], out: &mut Vec<Finding>) {
    let macros: HashMap<&str, &StubSymbol> = symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::FunctionMacro)
        .map(|s| (s.name.as_str(), s))
        .collect();

    for sym in symbols
        .iter()
        .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Variable))
    {
        if let Some(mac) = macros.get(sym.name.as_str()) {
            out.push(
                Finding::warning(
                    FindingKind::MacroShadowsDeclaration,
                    format!(
                        "{} '{}' is shadowed by the function-like macro at line {}",
                        sym.kind, sym.name, mac.line
                    ),
                )
                .line(sym.line),
            );
        }
    }
}

fn undeclared(header: &StubHeader, out: &mut Vec<Finding>) {
    let declared: HashSet<&str> = header
        .symbols()
        .iter()
        .filter(|s| s.kind != SymbolKind::Tag)
        .map(|s| s.name.as_str())
        .collect();

    let missing: BTreeMap<&str, usize> = header
        .usage()
        .external()
        .filter(|(name, _)| !declared.contains(name.as_str()))
        .map(|(name, stat)| (name.as_str(), stat.first_line))
        .collect();

    for (name, line) in missing {
        out.push(
            Finding::warning(
                FindingKind::UndeclaredInStub,
                format!("'{}' is used but never declared", name),
            )
            .line(line),
        );
    }
}

/// Check one stub header for declarations a parser or compiler would
/// reject or silently misread
pub fn lint(header: &StubHeader) -> Vec<Finding> {
    let mut findings = Vec::new();

    duplicate_tags(header.tags(), &mut findings);
    incomplete_members(header.tags(), &mut findings);
    redefinitions(header.symbols(), &mut findings);
    shadowed_declarations(header.symbols(), &mut findings);
    undeclared(header, &mut findings);

    for f in findings.iter_mut() {
        f.path = Some(header.path.clone());
    }
    findings.sort_by_key(|f| f.line);
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcorpus_shared::types::report::Severity;

    fn run(src: &str) -> Vec<Finding> {
        lint(&StubHeader::parse("stub.h", src))
    }

    fn kinds(findings: &[Finding]) -> Vec<FindingKind> {
        findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_clean_header() {
        let findings = run("\
typedef unsigned int u32;
struct in6_addr { u32 s6_addr32[4]; };
struct ipv6_mreq { struct in6_addr ipv6mr_multiaddr; int ipv6mr_ifindex; };
#define NULL ((void*)0)
u32 get_random_u32(void);
");
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_duplicate_and_mismatched_tags() {
        let findings = run("\
struct fd { int file; };
struct fd { int file; };
union fd;
");
        assert_eq!(
            kinds(&findings),
            vec![FindingKind::DuplicateTagDefinition, FindingKind::TagKindMismatch]
        );
        assert_eq!(findings[0].line, Some(2));
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("line 1"));
    }

    #[test]
    fn test_incomplete_member() {
        let findings = run("\
struct ipv6_mreq { struct in6_addr ipv6mr_multiaddr; int ipv6mr_ifindex; };
struct group_req { int gr_interface; struct sockaddr_storage *gr_group; };
struct in6_addr { unsigned char s6_addr[16]; };
");
        assert_eq!(kinds(&findings), vec![FindingKind::IncompleteMember]);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].line, Some(1));
        assert!(findings[0].message.contains("line 3"));
    }

    #[test]
    fn test_incomplete_member_reported_once_per_type() {
        let findings = run("\
struct group_source_req { unsigned int gsr_interface; struct sockaddr_storage gsr_group; struct sockaddr_storage gsr_source; };
");
        assert_eq!(kinds(&findings), vec![FindingKind::IncompleteMember]);
        assert!(findings[0].message.contains("'struct sockaddr_storage'"));
        assert!(findings[0].message.contains("never defined"));
    }

    #[test]
    fn test_macro_redefinition() {
        let findings = run("\
#define GFP_KERNEL 0
#define GFP_KERNEL 0
#define GFP_ATOMIC 0
#define GFP_ATOMIC 1
");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[1].severity, Severity::Error);
        assert_eq!(findings[1].line, Some(4));
    }

    #[test]
    fn test_typedef_conflict() {
        let findings = run("\
typedef unsigned int u32;
typedef unsigned int u32;
typedef long u32;
");
        assert_eq!(kinds(&findings), vec![FindingKind::TypedefConflict]);
        assert_eq!(findings[0].line, Some(3));
    }

    #[test]
    fn test_macro_shadows_prototype() {
        let findings = run("\
#define copy_from_user(to, from, n) 0
unsigned long copy_from_user(void *to, const void *from, unsigned long n);
");
        assert_eq!(kinds(&findings), vec![FindingKind::MacroShadowsDeclaration]);
        assert_eq!(findings[0].line, Some(2));
    }

    #[test]
    fn test_undeclared_in_stub() {
        let findings = run("\
struct sock { spinlock_t sk_lock; int sk_state; };
__be32 inet_addr(const char *cp);
#define __user
int copy_to_user(void __user *to, const void *from, unsigned long n);
");
        let names: Vec<&str> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::UndeclaredInStub)
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].contains("'spinlock_t'"));
        assert!(names[1].contains("'__be32'"));
        assert!(findings.iter().all(|f| f.path.as_deref() == Some(std::path::Path::new("stub.h"))));
    }
}
