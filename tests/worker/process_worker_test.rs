//! Process worker tests against small `sh` scripts speaking the NDJSON protocol.
#![cfg(unix)]

use adoc_content::worker::{
    AsciidocConverter, ConvertRequest, ConverterError, ExitEvent, InitOptions,
};
use futures::future::join_all;
use serde_json::json;
use std::time::Duration;

/// Echoes each request back. Files containing `broken` fail, files containing
/// `garbled` get a line that is not JSON. `$2` is the init JSON.
const ECHO_WORKER: &str = r#"
while IFS= read -r line; do
  file=$(printf '%s' "$line" | sed -n 's/.*"file":"\([^"]*\)".*/\1/p')
  case "$file" in
    *broken*) printf '{"type":"error","message":"cannot convert %s"}\n' "$file" ;;
    *garbled*) printf 'this is not json\n' ;;
    *) printf '{"type":"result","html":"<p>%s</p>","frontmatter":{"title":"%s","init":%s}}\n' "$file" "$file" "$2" ;;
  esac
done
"#;

async fn spawn_script(script: &str, init: &InitOptions) -> AsciidocConverter {
    let args = vec!["-c".to_string(), script.to_string(), "sh".to_string()];
    AsciidocConverter::spawn_process("sh", &args, init)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_replies_correlate_in_order() {
    let converter = spawn_script(ECHO_WORKER, &InitOptions::default()).await;

    let files: Vec<String> = (0..20).map(|i| format!("posts/{i}.adoc")).collect();
    let calls: Vec<_> = files
        .iter()
        .map(|f| converter.convert(ConvertRequest::new(f.clone())))
        .collect();
    let results = join_all(calls).await;

    for (file, result) in files.iter().zip(results) {
        let reply = result.unwrap();
        assert_eq!(reply.html, format!("<p>{file}</p>"));
        assert_eq!(reply.title(), Some(file.as_str()));
    }

    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_init_options_reach_worker() {
    let init = InitOptions {
        highlighters: vec!["rouge".to_string()],
        processor: None,
    };
    let converter = spawn_script(ECHO_WORKER, &init).await;

    let reply = converter
        .convert(ConvertRequest::new("a.adoc"))
        .await
        .unwrap();
    assert_eq!(reply.frontmatter["init"]["highlighters"], json!(["rouge"]));

    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_error_and_garbled_replies_settle_their_call() {
    let converter = spawn_script(ECHO_WORKER, &InitOptions::default()).await;

    let a = converter.convert(ConvertRequest::new("a.adoc"));
    let broken = converter.convert(ConvertRequest::new("broken.adoc"));
    let garbled = converter.convert(ConvertRequest::new("garbled.adoc"));
    let d = converter.convert(ConvertRequest::new("d.adoc"));
    let (a, broken, garbled, d) = tokio::join!(a, broken, garbled, d);

    assert_eq!(a.unwrap().html, "<p>a.adoc</p>");
    match broken {
        Err(ConverterError::Conversion(message)) => {
            assert_eq!(message, "cannot convert broken.adoc")
        }
        other => panic!("expected conversion error, got {other:?}"),
    }
    assert!(matches!(garbled, Err(ConverterError::DeserializeFailed(_))));
    assert_eq!(d.unwrap().html, "<p>d.adoc</p>");

    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_worker_exit_is_published() {
    let converter = spawn_script("exit 3", &InitOptions::default()).await;

    let exit = tokio::time::timeout(Duration::from_secs(10), converter.wait_for_exit())
        .await
        .unwrap();
    assert_eq!(exit, ExitEvent { code: Some(3) });
    assert!(!converter.is_alive());

    let late = converter.convert(ConvertRequest::new("a.adoc")).await;
    assert!(matches!(
        late,
        Err(ConverterError::WorkerExited { code: Some(3) })
    ));

    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_terminate_rejects_outstanding_calls() {
    // Never answers.
    let converter = spawn_script("sleep 30", &InitOptions::default()).await;

    let first = converter.convert(ConvertRequest::new("a.adoc"));
    let second = converter.convert(ConvertRequest::new("b.adoc"));
    converter.terminate().await.unwrap();

    assert!(matches!(first.await, Err(ConverterError::Terminated)));
    assert!(matches!(second.await, Err(ConverterError::Terminated)));
    assert!(converter.exit_status().is_some());
    assert!(!converter.is_alive());

    // Terminating twice is a no-op.
    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_missing_executable() {
    let result = AsciidocConverter::spawn_process(
        "/nonexistent/adoc-content-worker",
        &[],
        &InitOptions::default(),
    )
    .await;

    assert!(matches!(result, Err(ConverterError::SpawnFailed(_))));
}
