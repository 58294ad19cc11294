use std::fs;

use assert_cmd::Command;

#[test]
fn clone_binary_copies_a_directory_tree() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    fs::create_dir(src.path().join("shop")).unwrap();
    fs::write(src.path().join("shop/orders.ibd"), b"order-bytes").unwrap();

    let mut cmd = Command::cargo_bin("clone").unwrap();
    cmd.arg("--source")
        .arg(src.path())
        .arg("--dest")
        .arg(dst.path())
        .arg("--tasks")
        .arg("2");

    cmd.assert().success();

    let copied = fs::read(dst.path().join("shop/orders.ibd")).unwrap();
    assert_eq!(copied, b"order-bytes");
}

#[test]
fn clone_binary_reports_failure_for_missing_source() {
    let dst = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("clone").unwrap();
    cmd.arg("--source").arg("/nonexistent/source/path").arg("--dest").arg(dst.path());

    cmd.assert().failure();
}
