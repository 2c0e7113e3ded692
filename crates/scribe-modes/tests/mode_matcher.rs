use pretty_assertions::assert_eq;
use scribe_modes::{MatchRule, ModeMatcher};
use url::Url;

fn matched(url: &str, header: Option<&str>) -> (String, MatchRule) {
    let matcher = ModeMatcher::default();
    let url = Url::parse(url).unwrap();
    let m = matcher
        .match_mode(Some(&url), None, header.map(str::as_bytes))
        .unwrap();
    (m.mode.keyword().to_string(), m.rule)
}

#[test]
fn test_extension_picks_specific_mode() {
    assert_eq!(
        matched("file:///src/hello.py", Some("x = 1\n")),
        ("Python".to_string(), MatchRule::Url)
    );
    assert_eq!(
        matched("file:///src/main.c", Some("int x;\n")),
        ("C".to_string(), MatchRule::Url)
    );
    assert_eq!(
        matched("file:///notes/todo.txt", Some("buy milk\n")),
        ("Fundamental".to_string(), MatchRule::Url)
    );
}

#[test]
fn test_filename_regex() {
    assert_eq!(
        matched("file:///src/GNUmakefile", Some("all:\n")).0,
        "Makefile"
    );
    assert_eq!(matched("file:///src/Makefile.in", Some("")).0, "Makefile");
}

#[test]
fn test_emacs_modeline_overrides_extension() {
    assert_eq!(
        matched("file:///notes/script.txt", Some("# -*- mode: python -*-\nprint(1)\n")),
        ("Python".to_string(), MatchRule::Modeline)
    );
}

#[test]
fn test_vim_filetype_overrides_extension() {
    assert_eq!(
        matched("file:///notes/setup.txt", Some("echo hi\n# vim: ft=sh:\n")),
        ("Bash".to_string(), MatchRule::Modeline)
    );
}

#[test]
fn test_unknown_modeline_name_is_ignored() {
    assert_eq!(
        matched("file:///src/x.c", Some("/* -*- mode: cobol -*- */\n")),
        ("C".to_string(), MatchRule::Url)
    );
}

#[test]
fn test_bangpath_without_extension() {
    assert_eq!(
        matched("file:///usr/local/bin/deploy", Some("#!/bin/bash\nset -e\n")),
        ("Bash".to_string(), MatchRule::Bangpath)
    );
    assert_eq!(
        matched("file:///usr/local/bin/tool", Some("#!/usr/bin/env python\n")),
        ("Python".to_string(), MatchRule::Bangpath)
    );
}

#[test]
fn test_magic_identifies_diff() {
    let header = "--- a/main.c\n+++ b/main.c\n@@ -1 +1 @@\n";
    assert_eq!(
        matched("file:///tmp/changes", Some(header)),
        ("DiffEdit".to_string(), MatchRule::Magic)
    );
}

#[test]
fn test_patch_extension_without_diff_content_falls_back() {
    assert_eq!(
        matched("file:///tmp/notes.patch", Some("just some notes\n")),
        ("Fundamental".to_string(), MatchRule::Fallback)
    );
}

#[test]
fn test_about_pages_short_circuit() {
    assert_eq!(
        matched("about:scratch", Some("#!/bin/sh\n")),
        ("Fundamental".to_string(), MatchRule::Protocol)
    );
}

#[test]
fn test_unknown_extension_falls_back() {
    assert_eq!(
        matched("file:///data/blob.xyz", Some("hello\n")),
        ("Fundamental".to_string(), MatchRule::Fallback)
    );
}

#[test]
fn test_missing_resource_uses_url_only() {
    // No header: a bangpath in an imaginary header cannot be considered.
    assert_eq!(
        matched("file:///src/new.c", None),
        ("C".to_string(), MatchRule::Url)
    );
    assert_eq!(
        matched("file:///src/new", None),
        ("Fundamental".to_string(), MatchRule::Fallback)
    );
}

#[test]
fn test_match_keyword_accepts_aliases() {
    let matcher = ModeMatcher::default();
    assert_eq!(matcher.match_keyword("py").unwrap().keyword(), "Python");
    assert_eq!(matcher.match_keyword("Fortran 77").unwrap().keyword(), "Fortran77");
    assert!(matcher.match_keyword("cobol").is_none());
    assert_eq!(matcher.fallback().unwrap().keyword(), "Fundamental");
}
