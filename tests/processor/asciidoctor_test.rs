//! Asciidoctor processor tests against a fake `asciidoctor` executable.
#![cfg(unix)]

use adoc_content::processor::{self, AsciidoctorProcessor, Processor, ProcessorError};
use adoc_content::worker::{
    AsciidocConverter, ConvertRequest, ConverterError, Heading, InitOptions, WorkerMessage,
};
use serde_json::json;
use std::fs;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;

/// Prints fixed markup plus the arguments it was given, or fails for `bad` files.
const FAKE_ASCIIDOCTOR: &str = r#"#!/bin/sh
for last; do :; done
case "$last" in
  *bad*) echo "asciidoctor: ERROR: $last: line 3: unterminated block" >&2; exit 1 ;;
esac
printf '<!-- %s -->\n' "$*"
printf '<div class="sect1"><h2 id="_install">Install &amp; Run</h2></div>\n'
printf '<div class="sect2"><h3>Next steps</h3></div>\n'
"#;

/// Written once, before any test spawns a process.
static FAKE: LazyLock<(TempDir, PathBuf)> = LazyLock::new(|| {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("asciidoctor");
    fs::write(&path, FAKE_ASCIIDOCTOR).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    (dir, path)
});

fn fake_processor() -> AsciidoctorProcessor {
    AsciidoctorProcessor::new(InitOptions {
        highlighters: vec!["rouge".to_string()],
        processor: Some(FAKE.1.display().to_string()),
    })
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_convert_document() {
    let site = tempfile::tempdir().unwrap();
    let doc = write(
        site.path(),
        "guide.adoc",
        "---\nlayout: ../layouts/Doc.astro\n---\n= Getting Started\n:description: Intro\n\ninclude::partials/footer.adoc[]\n",
    );
    write(site.path(), "partials/footer.adoc", "Footer.\n");

    let reply = fake_processor()
        .convert(&ConvertRequest::new(doc.display().to_string()))
        .unwrap();

    assert!(reply.html.contains("-a skip-front-matter"));
    assert!(reply.html.contains("-a source-highlighter=rouge"));
    assert_eq!(reply.title(), Some("Getting Started"));
    assert_eq!(reply.frontmatter["description"], json!("Intro"));
    assert_eq!(reply.layout.as_deref(), Some("../layouts/Doc.astro"));
    assert_eq!(
        reply.headings,
        vec![
            Heading {
                depth: 2,
                slug: "_install".to_string(),
                text: "Install & Run".to_string(),
            },
            Heading {
                depth: 3,
                slug: "_next_steps".to_string(),
                text: "Next steps".to_string(),
            },
        ]
    );
    assert_eq!(
        reply.includes,
        vec![site.path().join("partials/footer.adoc").display().to_string()]
    );
}

#[test]
fn test_title_falls_back_to_file_stem() {
    let site = tempfile::tempdir().unwrap();
    let doc = write(site.path(), "release-notes.adoc", "Just text.\n");

    let reply = fake_processor()
        .convert(&ConvertRequest::new(doc.display().to_string()))
        .unwrap();

    assert_eq!(reply.title(), Some("release-notes"));
    assert_eq!(reply.layout, None);
    assert!(reply.includes.is_empty());
}

#[test]
fn test_processor_failure_carries_stderr() {
    let site = tempfile::tempdir().unwrap();
    let doc = write(site.path(), "bad.adoc", "= Bad\n");

    let err = fake_processor()
        .convert(&ConvertRequest::new(doc.display().to_string()))
        .unwrap_err();

    match err {
        ProcessorError::Failed { stderr, .. } => {
            assert!(stderr.contains("unterminated block"))
        }
        other => panic!("expected processor failure, got {other:?}"),
    }
}

#[test]
fn test_missing_source() {
    let site = tempfile::tempdir().unwrap();
    let missing = site.path().join("missing.adoc");

    let err = fake_processor()
        .convert(&ConvertRequest::new(missing.display().to_string()))
        .unwrap_err();

    assert!(matches!(err, ProcessorError::ReadSource { .. }));
}

#[test]
fn test_serve_answers_every_line() {
    let site = tempfile::tempdir().unwrap();
    let good = write(site.path(), "good.adoc", "= Good\n");
    let bad = write(site.path(), "bad.adoc", "= Bad\n");

    let input = format!(
        "{}\n\nnot a request\n{}\n",
        serde_json::to_string(&ConvertRequest::new(good.display().to_string())).unwrap(),
        serde_json::to_string(&ConvertRequest::new(bad.display().to_string())).unwrap(),
    );
    let mut output = Vec::new();

    let answered = processor::serve(Cursor::new(input), &mut output, &fake_processor()).unwrap();
    assert_eq!(answered, 3);

    let replies: Vec<WorkerMessage> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert!(matches!(&replies[0], WorkerMessage::Result(reply) if reply.title() == Some("Good")));
    assert!(
        matches!(&replies[1], WorkerMessage::Error { message } if message.starts_with("invalid request"))
    );
    assert!(
        matches!(&replies[2], WorkerMessage::Error { message } if message.contains("unterminated block"))
    );
}

#[tokio::test]
async fn test_thread_converter_with_asciidoctor() {
    let site = tempfile::tempdir().unwrap();
    let good = write(site.path(), "good.adoc", "= Good\n");
    let bad = write(site.path(), "bad.adoc", "= Bad\n");

    let converter = AsciidocConverter::spawn_thread(fake_processor()).unwrap();

    let good = converter.convert(ConvertRequest::new(good.display().to_string()));
    let bad = converter.convert(ConvertRequest::new(bad.display().to_string()));
    let (good, bad) = tokio::join!(good, bad);

    assert_eq!(good.unwrap().title(), Some("Good"));
    assert!(matches!(bad, Err(ConverterError::Conversion(_))));

    converter.terminate().await.unwrap();
}
