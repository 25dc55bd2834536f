mod common;

use common::{pkg, sack_with};
use flywheel::{
    AdvisoryRecord, CmpFlags, Keyname, LoadRepoFlags, PackageSet, Query, QueryFlags, ReldepExpr,
    ReldepOp, RepoDocument, Sack, SackOptions,
};

fn latest_sack() -> Sack {
    sack_with(
        vec![],
        vec![
            pkg("foo", "1", "1", "x86_64"),
            pkg("foo", "1", "2", "x86_64"),
            pkg("foo", "2", "1", "i686"),
            pkg("bar", "5", "1", "x86_64"),
        ],
    )
}

#[test]
fn test_latest_per_arch() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Name, CmpFlags::EQ, "foo")
        .unwrap();
    query.filter_latest_per_arch(true);
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["foo-1-2.x86_64", "foo-2-1.i686"]);
}

#[test]
fn test_latest_across_arches() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Name, CmpFlags::EQ, "foo")
        .unwrap();
    query.filter_latest(true);
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["foo-2-1.i686"]);
}

#[test]
fn test_set_algebra_laws() {
    let sack = latest_sack();
    fn all(sack: &Sack) -> Query<'_> {
        Query::new(sack)
    }

    // a ∪ b commutes.
    let mut ab = all(&sack);
    ab.filter_str(Keyname::Name, CmpFlags::EQ, "foo").unwrap();
    let mut b = all(&sack);
    b.filter_str(Keyname::Name, CmpFlags::EQ, "bar").unwrap();
    ab.union(b);

    let mut ba = all(&sack);
    ba.filter_str(Keyname::Name, CmpFlags::EQ, "bar").unwrap();
    let mut a = all(&sack);
    a.filter_str(Keyname::Name, CmpFlags::EQ, "foo").unwrap();
    ba.union(a);
    assert_eq!(ab.run_set(), ba.run_set());

    // a ∩ b = a − (a − b)
    let intersect = {
        let mut a = all(&sack);
        a.filter_str(Keyname::Name, CmpFlags::GLOB, "f*").unwrap();
        let mut b = all(&sack);
        b.filter_str(Keyname::Arch, CmpFlags::EQ, "x86_64").unwrap();
        a.intersection(b);
        a.run_set()
    };
    let double_difference = {
        let mut a = all(&sack);
        a.filter_str(Keyname::Name, CmpFlags::GLOB, "f*").unwrap();
        let mut a2 = a.clone();
        let mut b = all(&sack);
        b.filter_str(Keyname::Arch, CmpFlags::EQ, "x86_64").unwrap();
        a2.difference(b);
        let mut a_minus = Query::new(&sack);
        a_minus.filter_pkgset(Keyname::Pkg, CmpFlags::EQ, &a2.run_set()).unwrap();
        a.difference(a_minus);
        a.run_set()
    };
    assert_eq!(intersect, double_difference);

    // a − a = ∅
    let mut a = all(&sack);
    let a_copy = a.clone();
    a.difference(a_copy);
    assert_eq!(a.count(), 0);
}

#[test]
fn test_filter_empty_wins() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Name, CmpFlags::GLOB, "*")
        .unwrap();
    query.filter_empty();
    assert_eq!(query.count(), 0);
}

#[test]
fn test_excludes_are_honoured() {
    let mut sack = latest_sack();
    let excluded: PackageSet = {
        let mut query = Query::new(&sack);
        query
            .filter_str(Keyname::Name, CmpFlags::EQ, "bar")
            .unwrap();
        query.run_set()
    };
    sack.add_excludes(&excluded);

    let mut query = Query::new(&sack);
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert!(!names.contains(&"bar".to_string()));

    // A query that opts out still sees the excluded package.
    let mut unfiltered = Query::with_flags(
        &sack,
        QueryFlags {
            ignore_excludes: true,
        },
    );
    unfiltered
        .filter_str(Keyname::Name, CmpFlags::EQ, "bar")
        .unwrap();
    assert_eq!(unfiltered.count(), 1);
}

#[test]
fn test_epoch_boundaries() {
    let mut with_epoch = pkg("epochal", "1", "1", "noarch");
    with_epoch.epoch = Some(0);
    let without_epoch = pkg("plain", "1", "1", "noarch");
    let sack = sack_with(vec![], vec![with_epoch, without_epoch]);

    // An absent epoch is -1, never equal to an explicit 0.
    let mut query = Query::new(&sack);
    query.filter_num(Keyname::Epoch, CmpFlags::EQ, 0).unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["epochal"]);

    let mut query = Query::new(&sack);
    query.filter_num(Keyname::Epoch, CmpFlags::EQ, -1).unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["plain"]);
}

#[test]
fn test_evr_and_version_filters() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Name, CmpFlags::EQ, "foo")
        .unwrap();
    query
        .filter_str(Keyname::Evr, CmpFlags::GT, "1-1")
        .unwrap();
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["foo-1-2.x86_64", "foo-2-1.i686"]);

    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Version, CmpFlags::EQ, "2")
        .unwrap();
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["foo-2-1.i686"]);

    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Release, CmpFlags::GT, "1")
        .unwrap();
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["foo-1-2.x86_64"]);
}

#[test]
fn test_nevra_filter() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Nevra, CmpFlags::EQ, "foo-1-2.x86_64")
        .unwrap();
    assert_eq!(query.count(), 1);

    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Nevra, CmpFlags::GLOB, "foo-*.x86_64")
        .unwrap();
    assert_eq!(query.count(), 2);

    // The explicit zero-epoch spelling matches epoch-less packages.
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Nevra, CmpFlags::EQ, "foo-0:1-2.x86_64")
        .unwrap();
    assert_eq!(query.count(), 1);
}

#[test]
fn test_not_inverts() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Name, CmpFlags::EQ | CmpFlags::NOT, "bar")
        .unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["foo", "foo", "foo"]);
}

#[test]
fn test_bad_query_shapes() {
    let sack = latest_sack();
    let mut query = Query::new(&sack);
    assert!(query
        .filter_str(Keyname::Location, CmpFlags::SUBSTR, "x")
        .is_err());
    assert!(query.filter_num(Keyname::Name, CmpFlags::EQ, 3).is_err());
    assert!(query
        .filter_pkgset(Keyname::Name, CmpFlags::EQ, &PackageSet::default())
        .is_err());
    assert!(query
        .filter_str(Keyname::Nevra, CmpFlags::SUBSTR, "x")
        .is_err());
}

#[test]
fn test_provides_and_requires_filters() {
    let mut provider = pkg("lib", "2.0", "1", "x86_64");
    provider.provides = vec!["libapi = 2.0".into()];
    let mut consumer = pkg("app", "1.0", "1", "x86_64");
    consumer.requires = vec!["libapi >= 1.5".into()];
    let sack = sack_with(vec![], vec![provider, consumer]);

    let mut query = Query::new(&sack);
    query
        .filter_reldep(
            Keyname::Provides,
            ReldepExpr::with_constraint("libapi", ReldepOp::Ge, "1.0"),
        )
        .unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["lib"]);

    let mut query = Query::new(&sack);
    query
        .filter_reldep(
            Keyname::Requires,
            ReldepExpr::with_constraint("libapi", ReldepOp::Eq, "2.0"),
        )
        .unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["app"]);

    // Glob form over provide names.
    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::Provides, CmpFlags::GLOB, "libap*")
        .unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["lib"]);
}

#[test]
fn test_obsoletes_against_packageset() {
    let mut replacement = pkg("newmail", "1", "1", "x86_64");
    replacement.obsoletes = vec!["oldmail < 99".into()];
    let oldmail = pkg("oldmail", "3", "1", "x86_64");
    let sack = sack_with(vec![oldmail], vec![replacement]);

    let installed: PackageSet = {
        let mut query = Query::new(&sack);
        query
            .filter_str(Keyname::Reponame, CmpFlags::EQ, "@System")
            .unwrap();
        query.run_set()
    };

    let mut query = Query::new(&sack);
    query
        .filter_pkgset(Keyname::Obsoletes, CmpFlags::EQ, &installed)
        .unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["newmail"]);
}

#[test]
fn test_upgrades_and_downgrades_modifiers() {
    let sack = sack_with(
        vec![pkg("tool", "2.0", "1", "x86_64")],
        vec![
            pkg("tool", "1.0", "1", "x86_64"),
            pkg("tool", "3.0", "1", "x86_64"),
        ],
    );

    let mut query = Query::new(&sack);
    query.filter_upgrades(true);
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["tool-3.0-1.x86_64"]);

    let mut query = Query::new(&sack);
    query.filter_downgrades(true);
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["tool-1.0-1.x86_64"]);

    let mut query = Query::new(&sack);
    query.filter_upgradable(true);
    let nevras: Vec<String> = query.run().iter().map(|p| p.nevra()).collect();
    assert_eq!(nevras, vec!["tool-2.0-1.x86_64"]);
}

#[test]
fn test_disabled_repo_drops_out() {
    let mut sack = latest_sack();
    let mut query = Query::new(&sack);
    assert_eq!(query.count(), 4);

    sack.repo_enabled("main", false).unwrap();
    let mut query = Query::new(&sack);
    assert_eq!(query.count(), 0);

    sack.repo_enabled("main", true).unwrap();
    let mut query = Query::new(&sack);
    assert_eq!(query.count(), 4);
}

#[test]
fn test_advisory_filters() {
    let mut sack = flywheel::Sack::new(SackOptions::default()).unwrap();
    sack.load_repo(
        "updates",
        RepoDocument {
            packages: vec![pkg("flask", "2.0", "1.fc100", "noarch")],
            advisories: vec![AdvisoryRecord {
                id: "FEDORA-2026-0001".into(),
                kind: Some("security".into()),
                severity: Some("Critical".into()),
                bugs: vec!["2222222".into()],
                cves: vec!["CVE-2026-1234".into()],
                collection: vec![
                    "flask-2.0-1.fc100.noarch".into(),
                    // Duplicates in the metadata collapse.
                    "flask-2.0-1.fc100.noarch".into(),
                ],
            }],
            ..RepoDocument::default()
        },
        LoadRepoFlags {
            load_updateinfo: true,
            ..LoadRepoFlags::default()
        },
    )
    .unwrap();

    for (keyname, value) in [
        (Keyname::AdvisoryId, "FEDORA-2026-0001"),
        (Keyname::AdvisoryKind, "security"),
        (Keyname::AdvisorySeverity, "critical"),
        (Keyname::AdvisoryBug, "2222222"),
        (Keyname::AdvisoryCve, "CVE-2026-1234"),
    ] {
        let mut query = Query::new(&sack);
        query.filter_str(keyname, CmpFlags::EQ, value).unwrap();
        assert_eq!(query.count(), 1, "keyname {keyname} should match");
    }

    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::AdvisoryCve, CmpFlags::EQ, "CVE-1999-0000")
        .unwrap();
    assert_eq!(query.count(), 0);
}

#[test]
fn test_file_filter() {
    let mut tar = pkg("tar", "1.34", "1", "x86_64");
    tar.files = vec!["/usr/bin/tar".into(), "/usr/share/man/man1/tar.1.gz".into()];
    let sack = sack_with(vec![], vec![tar, pkg("bzip2", "1.0", "1", "x86_64")]);

    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::File, CmpFlags::EQ, "/usr/bin/tar")
        .unwrap();
    let names: Vec<String> = query.run().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["tar"]);

    let mut query = Query::new(&sack);
    query
        .filter_str(Keyname::File, CmpFlags::GLOB, "/usr/share/man/*")
        .unwrap();
    assert_eq!(query.count(), 1);
}
