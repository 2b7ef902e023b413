use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(dir: &Path, relative: &str) -> String {
    fs::read_to_string(dir.join(relative)).unwrap()
}

/// B/sub/page.ejs lands at O/sub/page.html
#[test]
fn test_tree_is_mirrored() {
    let dir = tempdir().unwrap();
    write(dir.path(), "site/index.ejs", "index");
    write(dir.path(), "site/sub/page.ejs", "page");
    write(dir.path(), "site/sub/deeper/leaf.ejs", "leaf");

    Command::cargo_bin("ejs-render")
        .unwrap()
        .current_dir(dir.path())
        .args(["-f", "**/*.ejs", "-b", "site", "-o", "public"])
        .assert()
        .success();

    assert_eq!(read(dir.path(), "public/index.html"), "index");
    assert_eq!(read(dir.path(), "public/sub/page.html"), "page");
    assert_eq!(read(dir.path(), "public/sub/deeper/leaf.html"), "leaf");
}

/// Only a missing extension gets `.html`
#[test]
fn test_extension_rules() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/readme", "plain");
    write(dir.path(), "src/feed.xml.ejs", "<rss/>");
    write(dir.path(), "src/robots.txt", "User-agent: *");

    Command::cargo_bin("ejs-render")
        .unwrap()
        .current_dir(dir.path())
        .args(["-f", "*", "-b", "src", "-o", "out"])
        .assert()
        .success();

    assert_eq!(read(dir.path(), "out/readme.html"), "plain");
    assert_eq!(read(dir.path(), "out/feed.xml"), "<rss/>");
    assert_eq!(read(dir.path(), "out/robots.txt"), "User-agent: *");
}

/// Existing files are replaced, not appended to
#[test]
fn test_existing_output_is_replaced() {
    let dir = tempdir().unwrap();
    write(dir.path(), "t/a.ejs", "new");
    write(dir.path(), "out/a.html", "old content that is longer");

    Command::cargo_bin("ejs-render")
        .unwrap()
        .current_dir(dir.path())
        .args(["a.ejs", "-b", "t", "-o", "out"])
        .assert()
        .success();

    assert_eq!(read(dir.path(), "out/a.html"), "new");
}

#[test]
fn test_substring_exclusion() {
    let dir = tempdir().unwrap();
    write(dir.path(), "site/index.ejs", "<%- include('partials/nav') %>");
    write(dir.path(), "site/partials/nav.ejs", "nav");
    write(dir.path(), "site/draft-post.ejs", "draft");

    Command::cargo_bin("ejs-render")
        .unwrap()
        .current_dir(dir.path())
        .args(["-f", "**/*.ejs", "-b", "site", "-o", "out"])
        .args(["-e", "partials draft-"])
        .assert()
        .success();

    assert_eq!(read(dir.path(), "out/index.html"), "nav");
    assert!(!dir.path().join("out/partials").exists());
    assert!(!dir.path().join("out/draft-post.html").exists());
}

#[test]
fn test_glob_exclusion() {
    let dir = tempdir().unwrap();
    write(dir.path(), "site/index.ejs", "index");
    write(dir.path(), "site/layout.partial.ejs", "layout");

    Command::cargo_bin("ejs-render")
        .unwrap()
        .current_dir(dir.path())
        .args(["-f", "*.ejs", "-b", "site", "-o", "out", "-e", "*.partial.ejs"])
        .assert()
        .success();

    assert!(dir.path().join("out/index.html").exists());
    assert!(!dir.path().join("out/layout.partial.html").exists());
}

/// A stdin template has no path to mirror
#[test]
fn test_stdin_template_writes_output_html() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("ejs-render")
        .unwrap()
        .current_dir(dir.path())
        .args(["-o", "out", "-s", r#"{"n": 3}"#])
        .write_stdin("n=<%= n %>")
        .assert()
        .success()
        .stdout("");

    assert_eq!(read(dir.path(), "out/output.html"), "n=3");
}
