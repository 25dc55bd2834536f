mod common;

use std::path::PathBuf;

use assert_matches::assert_matches;
use common::pkg;
use flywheel::transaction::rpm::{DenylistKeyring, NullKeyring, RecordingRuntime};
use flywheel::{
    CmpFlags, Error, Goal, ItemAction, Keyname, LoadRepoFlags, PackageRecord, Query, ReasonStore,
    RepoDocument, Sack, SackOptions, SystemStateDocument, TransactionDriver, TransactionFlags,
};

struct Fixture {
    sack: Sack,
    cachedir: tempfile::TempDir,
    reasondir: tempfile::TempDir,
}

fn located(mut record: PackageRecord, location: &str, size: u64) -> PackageRecord {
    record.location = Some(location.to_string());
    record.download_size = size;
    record.pkgid = Some(format!("sha-{}", record.name));
    record
}

fn fixture(system: Vec<PackageRecord>, available: Vec<PackageRecord>, gpgcheck: bool) -> Fixture {
    let cachedir = tempfile::tempdir().unwrap();
    let reasondir = tempfile::tempdir().unwrap();
    let mut sack = Sack::new(SackOptions {
        cachedir: Some(cachedir.path().to_path_buf()),
        make_cache_dir: true,
        ..SackOptions::default()
    })
    .unwrap();
    sack.load_system_repo(SystemStateDocument { packages: system }, false)
        .unwrap();
    sack.load_repo(
        "main",
        RepoDocument {
            gpgcheck,
            packages: available,
            ..RepoDocument::default()
        },
        LoadRepoFlags::default(),
    )
    .unwrap();
    Fixture {
        sack,
        cachedir,
        reasondir,
    }
}

impl Fixture {
    fn stage_file(&self, location: &str) -> PathBuf {
        let path = self.cachedir.path().join(location);
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(&path, b"not really an rpm").unwrap();
        path
    }

    fn driver(&self) -> (TransactionDriver<'_>, std::rc::Rc<std::cell::RefCell<flywheel::transaction::rpm::RecordingState>>) {
        let (runtime, state) = RecordingRuntime::new();
        let driver = TransactionDriver::new(
            &self.sack,
            Box::new(runtime),
            Box::new(NullKeyring),
            ReasonStore::new(self.reasondir.path()),
        );
        (driver, state)
    }
}

fn find<'a>(sack: &'a Sack, nevra: &str) -> flywheel::Package<'a> {
    let mut query = Query::new(sack);
    query
        .filter_str(Keyname::Nevra, CmpFlags::EQ, nevra)
        .unwrap();
    query
        .run()
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("fixture package {nevra} exists"))
}

#[test]
fn test_upgrade_commit_pipeline() {
    let fx = fixture(
        vec![pkg("app", "1.0", "1", "x86_64")],
        vec![located(pkg("app", "2.0", "1", "x86_64"), "pkgs/app-2.0.rpm", 1024)],
        false,
    );
    let staged = fx.stage_file("pkgs/app-2.0.rpm");

    let (mut driver, state) = fx.driver();
    driver.set_uid(1000);
    driver.set_releasever("100");
    driver
        .reason_store()
        .set_string("app-1.0-1.x86_64", "reason", "user")
        .unwrap();

    let mut goal = Goal::new(&fx.sack);
    goal.upgrade_all();
    driver.depsolve(&mut goal).expect("depsolve succeeds");
    assert!(driver.pkgs_to_download().is_empty());

    driver.commit(&goal).expect("commit succeeds");

    let state = state.borrow();
    assert_eq!(state.root.as_deref(), Some(fx.sack.rootdir()));
    assert_eq!(state.installs.len(), 1);
    let (path, nevra, is_upgrade, allow_untrusted) = &state.installs[0];
    assert_eq!(path, &staged);
    assert_eq!(nevra, "app-2.0-1.x86_64");
    assert!(*is_upgrade);
    assert!(*allow_untrusted);
    // The displaced predecessor is removed as cleanup bookkeeping.
    assert_eq!(state.removals, vec!["app-1.0-1.x86_64".to_string()]);
    assert!(state.ordered);
    // One test pass, one real pass.
    assert_eq!(state.runs.len(), 2);
    assert!(state.runs[0].0.test);
    assert!(!state.runs[1].0.test);

    // Reason propagation: the new version inherits "user" from the old one.
    let store = driver.reason_store();
    assert_eq!(
        store.get_string("app-2.0-1.x86_64", "reason").unwrap().as_deref(),
        Some("user")
    );
    assert_eq!(
        store.get_string("app-2.0-1.x86_64", "from_repo").unwrap().as_deref(),
        Some("main")
    );
    assert_eq!(
        store
            .get_string("app-2.0-1.x86_64", "installed_by")
            .unwrap()
            .as_deref(),
        Some("1000")
    );
    assert_eq!(
        store
            .get_string("app-2.0-1.x86_64", "releasever")
            .unwrap()
            .as_deref(),
        Some("100")
    );
    // The displaced package's rows are gone, and so is the downloaded file.
    assert_eq!(store.get_string("app-1.0-1.x86_64", "reason").unwrap(), None);
    assert!(!staged.exists());

    let helper = driver.remove_helper_items();
    assert_eq!(helper.len(), 1);
    assert_eq!(helper[0].action, ItemAction::Cleanup);
    assert_eq!(helper[0].pkgid, None);
}

#[test]
fn test_fresh_install_reason_is_user() {
    let fx = fixture(
        vec![],
        vec![located(pkg("tool", "1.0", "1", "x86_64"), "pkgs/tool.rpm", 64)],
        false,
    );
    fx.stage_file("pkgs/tool.rpm");

    let (mut driver, state) = fx.driver();
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "tool-1.0-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    driver.commit(&goal).unwrap();

    assert_eq!(state.borrow().installs.len(), 1);
    assert_eq!(
        driver
            .reason_store()
            .get_string("tool-1.0-1.x86_64", "reason")
            .unwrap()
            .as_deref(),
        Some("user")
    );
}

#[test]
fn test_test_flag_leaves_no_trace() {
    let fx = fixture(
        vec![],
        vec![located(pkg("tool", "1.0", "1", "x86_64"), "pkgs/tool.rpm", 64)],
        false,
    );
    let staged = fx.stage_file("pkgs/tool.rpm");

    let (mut driver, state) = fx.driver();
    driver.set_flags(TransactionFlags {
        test: true,
        ..TransactionFlags::default()
    });
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "tool-1.0-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    driver.commit(&goal).expect("test commit succeeds");

    // The runtime saw a TEST run, nothing was recorded and the cache is
    // untouched.
    assert!(state.borrow().runs.iter().all(|(flags, _)| flags.test));
    assert_eq!(
        driver
            .reason_store()
            .get_string("tool-1.0-1.x86_64", "reason")
            .unwrap(),
        None
    );
    assert!(staged.exists());
}

#[test]
fn test_free_space_precheck() {
    let fx = fixture(
        vec![],
        vec![located(
            pkg("huge", "1.0", "1", "x86_64"),
            "pkgs/huge.rpm",
            u64::MAX / 2,
        )],
        false,
    );
    // The file is deliberately not staged, so it counts as a download.

    let (mut driver, _state) = fx.driver();
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "huge-1.0-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    assert_eq!(driver.pkgs_to_download().len(), 1);

    assert_matches!(driver.commit(&goal), Err(Error::NoSpace { .. }));
}

#[test]
fn test_gpg_policy_matrix() {
    // Repo with gpgcheck: a failed signature is fatal.
    let fx = fixture(
        vec![],
        vec![located(pkg("tool", "1.0", "1", "x86_64"), "pkgs/tool.rpm", 64)],
        true,
    );
    let staged = fx.stage_file("pkgs/tool.rpm");

    let (runtime, _state) = RecordingRuntime::new();
    let mut driver = TransactionDriver::new(
        &fx.sack,
        Box::new(runtime),
        Box::new(DenylistKeyring {
            bad: vec![staged.clone()],
        }),
        ReasonStore::new(fx.reasondir.path()),
    );
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "tool-1.0-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    assert_matches!(
        driver.commit(&goal),
        Err(Error::GpgSignatureInvalid { .. })
    );

    // Without gpgcheck and without only-trusted the failure is tolerated.
    let fx = fixture(
        vec![],
        vec![located(pkg("tool", "1.0", "1", "x86_64"), "pkgs/tool.rpm", 64)],
        false,
    );
    let staged = fx.stage_file("pkgs/tool.rpm");
    let (runtime, state) = RecordingRuntime::new();
    let mut driver = TransactionDriver::new(
        &fx.sack,
        Box::new(runtime),
        Box::new(DenylistKeyring {
            bad: vec![staged.clone()],
        }),
        ReasonStore::new(fx.reasondir.path()),
    );
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "tool-1.0-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    driver.commit(&goal).expect("untrusted tolerated");
    assert_eq!(state.borrow().installs.len(), 1);

    // only-trusted makes it fatal again, repo policy or not.
    let fx = fixture(
        vec![],
        vec![located(pkg("tool", "1.0", "1", "x86_64"), "pkgs/tool.rpm", 64)],
        false,
    );
    let staged = fx.stage_file("pkgs/tool.rpm");
    let (runtime, _state) = RecordingRuntime::new();
    let mut driver = TransactionDriver::new(
        &fx.sack,
        Box::new(runtime),
        Box::new(DenylistKeyring { bad: vec![staged] }),
        ReasonStore::new(fx.reasondir.path()),
    );
    driver.set_flags(TransactionFlags {
        only_trusted: true,
        ..TransactionFlags::default()
    });
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "tool-1.0-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    assert_matches!(
        driver.commit(&goal),
        Err(Error::GpgSignatureInvalid { .. })
    );
}

#[test]
fn test_installonly_erase_is_relabelled_cleanup() {
    let mut fx = {
        let cachedir = tempfile::tempdir().unwrap();
        let reasondir = tempfile::tempdir().unwrap();
        let mut sack = Sack::new(SackOptions {
            cachedir: Some(cachedir.path().to_path_buf()),
            make_cache_dir: true,
            ..SackOptions::default()
        })
        .unwrap();
        sack.load_system_repo(
            SystemStateDocument {
                packages: vec![
                    pkg("kernel", "1", "1", "x86_64"),
                    pkg("kernel", "2", "1", "x86_64"),
                ],
            },
            false,
        )
        .unwrap();
        sack.load_repo(
            "main",
            RepoDocument {
                packages: vec![located(
                    pkg("kernel", "3", "1", "x86_64"),
                    "pkgs/kernel-3.rpm",
                    64,
                )],
                ..RepoDocument::default()
            },
            LoadRepoFlags::default(),
        )
        .unwrap();
        Fixture {
            sack,
            cachedir,
            reasondir,
        }
    };
    fx.sack.set_installonly(&["kernel"]);
    fx.sack.set_installonly_limit(2);
    fx.sack.set_running_kernel_release("2-1.x86_64");
    fx.stage_file("pkgs/kernel-3.rpm");

    let (mut driver, state) = fx.driver();
    let mut goal = Goal::new(&fx.sack);
    goal.install(&find(&fx.sack, "kernel-3-1.x86_64"));
    driver.depsolve(&mut goal).unwrap();
    driver.commit(&goal).expect("commit succeeds");

    // kernel-1 is removed, but since a kernel is also incoming the removal
    // is bookkeeping, not a user-visible erase.
    assert_eq!(state.borrow().removals, vec!["kernel-1-1.x86_64".to_string()]);
    let remove_items = driver.remove_items();
    assert_eq!(remove_items.len(), 1);
    assert_eq!(remove_items[0].action, ItemAction::Cleanup);

    // Install-only packages are always recorded as user-wanted.
    assert_eq!(
        driver
            .reason_store()
            .get_string("kernel-3-1.x86_64", "reason")
            .unwrap()
            .as_deref(),
        Some("user")
    );
}
