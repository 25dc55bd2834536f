//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use flywheel::{LoadRepoFlags, PackageRecord, RepoDocument, Sack, SackOptions, SystemStateDocument};

/// A minimal package record.
pub fn pkg(name: &str, version: &str, release: &str, arch: &str) -> PackageRecord {
    PackageRecord {
        name: name.into(),
        version: version.into(),
        release: release.into(),
        arch: arch.into(),
        ..PackageRecord::default()
    }
}

/// A sack with an installed system and a single `main` repository.
pub fn sack_with(system: Vec<PackageRecord>, available: Vec<PackageRecord>) -> Sack {
    let mut sack = Sack::new(SackOptions::default()).expect("default options are valid");
    sack.load_system_repo(SystemStateDocument { packages: system }, false)
        .expect("system repo loads");
    sack.load_repo(
        "main",
        RepoDocument {
            packages: available,
            ..RepoDocument::default()
        },
        LoadRepoFlags {
            load_filelists: true,
            load_updateinfo: true,
            ..LoadRepoFlags::default()
        },
    )
    .expect("main repo loads");
    sack
}
