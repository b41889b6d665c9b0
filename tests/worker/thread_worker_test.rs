use adoc_content::processor::{Processor, ProcessorError};
use adoc_content::worker::{
    AsciidocConverter, ConvertReply, ConvertRequest, ConverterError, ExitEvent,
};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

/// Records every file it sees and renders it as a tiny HTML body.
#[derive(Clone, Default)]
struct RecordingProcessor {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Processor for RecordingProcessor {
    fn convert(&self, request: &ConvertRequest) -> Result<ConvertReply, ProcessorError> {
        self.seen.lock().unwrap().push(request.file.clone());

        if request.file.contains("broken") {
            return Err(ProcessorError::other(format!("cannot parse {}", request.file)));
        }
        if request.file.contains("boom") {
            panic!("processor crashed on {}", request.file);
        }

        let mut frontmatter = Map::new();
        frontmatter.insert("title".to_string(), Value::String(request.file.clone()));
        Ok(ConvertReply {
            html: format!("<p>{}</p>", request.file),
            frontmatter,
            headings: Vec::new(),
            layout: None,
            includes: Vec::new(),
        })
    }
}

#[tokio::test]
async fn test_results_match_requests() {
    let processor = RecordingProcessor::default();
    let converter = AsciidocConverter::spawn_thread(processor.clone()).unwrap();

    let files: Vec<String> = (0..10).map(|i| format!("doc-{i}.adoc")).collect();
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

    // The worker saw the requests in submission order.
    assert_eq!(*processor.seen.lock().unwrap(), files);

    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_failure_does_not_affect_neighbours() {
    let converter = AsciidocConverter::spawn_thread(RecordingProcessor::default()).unwrap();

    let a = converter.convert(ConvertRequest::new("a.adoc"));
    let b = converter.convert(ConvertRequest::new("broken.adoc"));
    let c = converter.convert(ConvertRequest::new("c.adoc"));

    let (a, b, c) = tokio::join!(a, b, c);

    assert_eq!(a.unwrap().html, "<p>a.adoc</p>");
    match b {
        Err(ConverterError::Conversion(message)) => {
            assert!(message.contains("cannot parse broken.adoc"))
        }
        other => panic!("expected conversion error, got {other:?}"),
    }
    assert_eq!(c.unwrap().html, "<p>c.adoc</p>");

    let stats = converter.stats().await.unwrap();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);
    assert!(!stats.in_flight);

    converter.terminate().await.unwrap();
}

#[tokio::test]
async fn test_terminate_reports_clean_exit() {
    let converter = AsciidocConverter::spawn_thread(RecordingProcessor::default()).unwrap();
    let mut exits = converter.subscribe_exit();

    converter
        .convert(ConvertRequest::new("a.adoc"))
        .await
        .unwrap();
    converter.terminate().await.unwrap();

    assert_eq!(exits.recv().await.unwrap(), ExitEvent { code: Some(0) });
    assert_eq!(converter.wait_for_exit().await, ExitEvent { code: Some(0) });
    assert!(!converter.is_alive());

    let late = converter.convert(ConvertRequest::new("late.adoc")).await;
    assert!(matches!(late, Err(ConverterError::Terminated)));
}

#[tokio::test]
async fn test_panic_fails_only_that_request() {
    let processor = RecordingProcessor::default();
    let converter = AsciidocConverter::spawn_thread(processor.clone()).unwrap();

    let before = converter.convert(ConvertRequest::new("before.adoc"));
    let boom = converter.convert(ConvertRequest::new("boom.adoc"));
    let after = converter.convert(ConvertRequest::new("after.adoc"));
    let (before, boom, after) = tokio::join!(before, boom, after);

    assert_eq!(before.unwrap().html, "<p>before.adoc</p>");
    match boom {
        Err(ConverterError::Conversion(message)) => {
            assert!(message.contains("processor crashed on boom.adoc"))
        }
        other => panic!("expected conversion error, got {other:?}"),
    }
    assert_eq!(after.unwrap().html, "<p>after.adoc</p>");

    assert!(converter.is_alive());
    assert_eq!(converter.exit_status(), None);
    assert_eq!(
        *processor.seen.lock().unwrap(),
        vec!["before.adoc", "boom.adoc", "after.adoc"]
    );

    converter.terminate().await.unwrap();
    assert_eq!(converter.wait_for_exit().await, ExitEvent { code: Some(0) });
}

#[tokio::test]
async fn test_request_options_reach_processor() {
    struct OptionsProcessor;

    impl Processor for OptionsProcessor {
        fn convert(&self, request: &ConvertRequest) -> Result<ConvertReply, ProcessorError> {
            let options = serde_json::to_value(&request.options)
                .map_err(|e| ProcessorError::other(e.to_string()))?;
            let mut frontmatter = Map::new();
            frontmatter.insert("title".to_string(), json!("options"));
            frontmatter.insert("options".to_string(), options);
            Ok(ConvertReply {
                html: String::new(),
                frontmatter,
                headings: Vec::new(),
                layout: None,
                includes: Vec::new(),
            })
        }
    }

    let converter = AsciidocConverter::spawn_thread(OptionsProcessor).unwrap();
    let options = serde_json::from_value(json!({
        "attributes": { "toc": true, "icons": "font" },
        "safe": "safe"
    }))
    .unwrap();

    let reply = converter
        .convert(ConvertRequest::new("a.adoc").with_options(options))
        .await
        .unwrap();

    assert_eq!(reply.frontmatter["options"]["safe"], json!("safe"));
    assert_eq!(reply.frontmatter["options"]["attributes"]["toc"], json!(true));
    assert_eq!(
        reply.frontmatter["options"]["attributes"]["icons"],
        json!("font")
    );

    converter.terminate().await.unwrap();
}
