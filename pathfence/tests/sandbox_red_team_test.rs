//! Red team tests: escape attempts through the guarded adapter.
//!
//! Each test plants a symlink or a traversal inside the allowed root and
//! checks that nothing outside the boundaries is read, written or removed.

#![cfg(unix)]

use pathfence::test_utils::SandboxFixture;
use pathfence::utils::logging::init_test_logging;
use pathfence::{CopyOptions, CreateDirOptions, GuardError, RemoveOptions};

fn assert_denied<T: std::fmt::Debug>(result: Result<T, GuardError>) {
    match result {
        Err(err) => assert!(err.is_not_allowed(), "expected PathNotAllowed, got {err:?}"),
        Ok(value) => panic!("SECURITY: expected PathNotAllowed, got Ok({value:?})"),
    }
}

#[tokio::test]
async fn red_team_read_through_file_symlink_blocked() {
    init_test_logging();
    let fx = SandboxFixture::new().unwrap();
    let secret = fx.seed_file(fx.outside.join("secret.txt"), "s3cret").unwrap();
    fx.symlink(&secret, fx.allowed.join("innocent.txt")).unwrap();
    let fs = fx.strict_fs();

    assert_denied(fs.read(fx.allowed.join("innocent.txt")).await);
    assert_denied(fs.read_to_string(fx.allowed.join("innocent.txt")).await);
}

#[tokio::test]
async fn red_team_list_through_directory_symlink_blocked() {
    let fx = SandboxFixture::new().unwrap();
    fx.seed_file(fx.outside.join("private.key"), "k").unwrap();
    fx.symlink(&fx.outside, fx.allowed.join("docs")).unwrap();
    let fs = fx.strict_fs();

    assert_denied(fs.list_dir(fx.allowed.join("docs")).await);
    assert_denied(fs.metadata(fx.allowed.join("docs").join("private.key")).await);
}

#[tokio::test]
async fn red_team_write_through_symlinked_parent_blocked() {
    let fx = SandboxFixture::new().unwrap();
    fx.symlink(&fx.outside, fx.allowed.join("cache")).unwrap();
    let fs = fx.strict_fs();

    assert_denied(fs.write(fx.allowed.join("cache").join("payload.sh"), "x").await);
    assert_denied(
        fs.create_dir(
            fx.allowed.join("cache").join("a").join("b"),
            CreateDirOptions { recursive: true },
        )
        .await,
    );
    assert!(!fx.outside.join("payload.sh").exists());
    assert!(!fx.outside.join("a").exists());
}

#[tokio::test]
async fn red_team_write_through_dangling_symlink_blocked() {
    let fx = SandboxFixture::new().unwrap();
    let planted = fx.outside.join("authorized_keys");
    fx.symlink(&planted, fx.allowed.join("notes.txt")).unwrap();
    let fs = fx.strict_fs();

    assert_denied(fs.write(fx.allowed.join("notes.txt"), "ssh-ed25519 AAAA").await);
    assert_denied(fs.append(fx.allowed.join("notes.txt"), "ssh-ed25519 AAAA").await);
    assert!(!planted.exists());
}

#[tokio::test]
async fn red_team_overwrite_through_symlink_blocked() {
    let fx = SandboxFixture::new().unwrap();
    let config_file = fx.seed_file(fx.outside.join("config.toml"), "original").unwrap();
    fx.symlink(&config_file, fx.allowed.join("config.toml")).unwrap();
    let fs = fx.strict_fs();

    assert_denied(fs.write(fx.allowed.join("config.toml"), "pwned").await);
    assert_eq!(std::fs::read_to_string(&config_file).unwrap(), "original");
}

#[tokio::test]
async fn red_team_copy_and_rename_via_symlink_blocked() {
    let fx = SandboxFixture::new().unwrap();
    let secret = fx.seed_file(fx.outside.join("secret.txt"), "s3cret").unwrap();
    fx.symlink(&secret, fx.allowed.join("link.txt")).unwrap();
    fx.symlink(&fx.outside, fx.allowed.join("drop")).unwrap();
    let inside = fx.seed_file(fx.allowed.join("report.txt"), "r").unwrap();
    let fs = fx.strict_fs();

    assert_denied(
        fs.copy(
            fx.allowed.join("link.txt"),
            fx.allowed.join("copy.txt"),
            CopyOptions::default(),
        )
        .await,
    );
    assert_denied(
        fs.copy(&inside, fx.allowed.join("drop").join("exfil.txt"), CopyOptions::default())
            .await,
    );
    assert_denied(fs.rename(&inside, fx.allowed.join("drop").join("exfil.txt")).await);

    assert!(!fx.allowed.join("copy.txt").exists());
    assert!(!fx.outside.join("exfil.txt").exists());
    assert!(inside.exists());
}

#[tokio::test]
async fn red_team_remove_through_symlinked_directory_blocked() {
    let fx = SandboxFixture::new().unwrap();
    let victim = fx.seed_file(fx.outside.join("victim.txt"), "v").unwrap();
    fx.symlink(&fx.outside, fx.allowed.join("trash")).unwrap();
    let fs = fx.strict_fs();

    assert_denied(fs.remove_file(fx.allowed.join("trash").join("victim.txt")).await);
    assert_denied(
        fs.remove(
            fx.allowed.join("trash").join("victim.txt"),
            RemoveOptions {
                recursive: true,
                force: true,
            },
        )
        .await,
    );
    assert!(victim.exists());
}

#[tokio::test]
async fn red_team_remove_link_never_deletes_target() {
    let fx = SandboxFixture::new().unwrap();
    let target = fx.seed_file(fx.allowed.join("target.txt"), "t").unwrap();
    let link = fx.allowed.join("alias.txt");
    fx.symlink(&target, &link).unwrap();
    let fs = fx.strict_fs();

    fs.remove_file(&link).await.unwrap();
    assert!(std::fs::symlink_metadata(&link).is_err());
    assert!(target.exists());
}

#[tokio::test]
async fn red_team_dangling_internal_link_can_be_removed() {
    let fx = SandboxFixture::new().unwrap();
    let link = fx.allowed.join("stale");
    fx.symlink(fx.allowed.join("was-here.txt"), &link).unwrap();
    let fs = fx.strict_fs();

    fs.remove(&link, RemoveOptions::default()).await.unwrap();
    assert!(std::fs::symlink_metadata(&link).is_err());
}

#[tokio::test]
async fn red_team_rename_moves_link_not_target() {
    let fx = SandboxFixture::new().unwrap();
    let target = fx.seed_file(fx.allowed.join("t.txt"), "t").unwrap();
    let link = fx.allowed.join("l.txt");
    fx.symlink(&target, &link).unwrap();
    let fs = fx.strict_fs();

    let moved = fx.allowed.join("moved-link.txt");
    fs.rename(&link, &moved).await.unwrap();
    assert!(
        std::fs::symlink_metadata(&moved)
            .unwrap()
            .file_type()
            .is_symlink()
    );
    assert!(target.exists());
}

#[tokio::test]
async fn red_team_lstat_reports_link_without_following() {
    let fx = SandboxFixture::new().unwrap();
    let link = fx.allowed.join("escape");
    fx.symlink(&fx.outside, &link).unwrap();
    let fs = fx.strict_fs();

    let meta = fs.symlink_metadata(&link).await.unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(fs.read_link(&link).await.unwrap(), fx.outside);

    // Following the link is still refused.
    assert_denied(fs.metadata(&link).await);
    assert_denied(fs.symlink_metadata(link.join("anything")).await);
}

#[tokio::test]
async fn red_team_encoded_and_doubled_traversal_blocked() {
    let fx = SandboxFixture::new().unwrap();
    fx.seed_file(fx.outside.join("secret.txt"), "s").unwrap();
    let fs = fx.strict_fs();

    for attempt in [
        "allowed/../outside/secret.txt",
        "allowed/./../outside/secret.txt",
        "allowed//..//outside/secret.txt",
        "allowed/a/b/../../../outside/secret.txt",
    ] {
        assert_denied(fs.read(attempt).await);
    }

    // Percent-encoding is not decoded: this is a literal file name inside the root.
    let literal = fs.read("allowed/%2e%2e/outside/secret.txt").await.unwrap_err();
    assert!(!literal.is_not_allowed());
}

#[tokio::test]
async fn red_team_nul_byte_rejected_as_invalid_argument() {
    let fx = SandboxFixture::new().unwrap();
    let fs = fx.strict_fs();

    let err = fs.read("allowed/a.txt\0../../etc/passwd").await.unwrap_err();
    assert!(matches!(err, GuardError::InvalidPathArgument { .. }));
    assert_eq!(err.status_code(), 400);
}
