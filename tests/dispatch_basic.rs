use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use llm_dispatch::http::{HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};
use llm_dispatch::{
    BackendTarget, ChatMessage, DispatchRequest, Dispatcher, Fragment, LLMError,
};
use serde_json::{Value, json};

/// In-memory transport that records requests and replays canned body chunks.
struct ScriptedTransport {
    status: u16,
    chunks: Vec<Vec<u8>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(status: u16, chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            status,
            chunks: chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn ok_json(body: Value) -> Arc<Self> {
        Self::new(200, &[body.to_string().as_str()])
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }

    fn only_body(&self) -> Value {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        serde_json::from_slice(requests[0].body.as_ref().expect("body")).expect("json body")
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        self.requests.lock().expect("lock").push(request);
        Ok(HttpResponse {
            status: self.status,
            headers: Default::default(),
            body: self.chunks.concat(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        self.requests.lock().expect("lock").push(request);
        let chunks: Vec<Result<Vec<u8>, LLMError>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(HttpStreamResponse {
            status: self.status,
            headers: Default::default(),
            body: Box::pin(stream::iter(chunks)),
        })
    }
}

fn target(model: &str) -> BackendTarget {
    BackendTarget::new("https://backend.example.com/v1/endpoint", "secret", model)
}

#[tokio::test]
async fn messages_always_use_chat_style() {
    for model in ["claude-2", "anthropic.claude-v2", "ds-v3", "gpt-x"] {
        let transport = ScriptedTransport::ok_json(json!({"choices": []}));
        let dispatcher = Dispatcher::new(transport.clone());
        let request = DispatchRequest::messages(vec![ChatMessage::user("你好")])
            .with_prompt("unused")
            .with_instances(vec![json!({"input": "unused"})]);

        dispatcher
            .dispatch(&target(model), request)
            .await
            .expect("chat dispatch");

        let body = transport.only_body();
        assert_eq!(body["model"], json!(model));
        assert_eq!(body["messages"], json!([{"role": "user", "content": "你好"}]));
        assert!(body.get("prompt").is_none());
        assert!(body.get("instances").is_none());
    }
}

#[tokio::test]
async fn claude_without_prompt_fails_before_network() {
    for model in ["claude-2", "Claude-Instant", "CLAUDE"] {
        let transport = ScriptedTransport::ok_json(json!({}));
        let dispatcher = Dispatcher::new(transport.clone());

        let err = dispatcher
            .dispatch(&target(model), DispatchRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_config(), "model {model}: {err:?}");

        let err = dispatcher
            .dispatch(
                &target(model),
                DispatchRequest::instances(vec![json!({"input": "x"})]),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, LLMError::InvalidConfig { ref field, .. } if field == "prompt"),
            "model {model}: {err:?}"
        );

        assert!(transport.requests().is_empty());
    }
}

#[tokio::test]
async fn ds_model_wraps_prompt_into_instances() {
    let transport = ScriptedTransport::ok_json(json!({"predictions": ["你好"]}));
    let dispatcher = Dispatcher::new(transport.clone());

    let response = dispatcher
        .dispatch(&target("ds-v3"), DispatchRequest::prompt("Hello"))
        .await
        .expect("instances dispatch")
        .into_complete()
        .expect("complete");

    assert_eq!(response, json!({"predictions": ["你好"]}));
    assert_eq!(
        transport.only_body(),
        json!({"instances": [{"input": "Hello"}], "stream": false})
    );
    assert_eq!(
        transport.requests()[0].headers.get("Authorization"),
        Some(&"Bearer secret".to_string())
    );
}

#[tokio::test]
async fn plain_model_with_prompt_uses_freeform_defaults() {
    let transport = ScriptedTransport::ok_json(json!({"text": "ok"}));
    let dispatcher = Dispatcher::new(transport.clone());

    dispatcher
        .dispatch(&target("gpt-x"), DispatchRequest::prompt("Translate: hi"))
        .await
        .expect("prompt dispatch");

    assert_eq!(
        transport.only_body(),
        json!({"prompt": "Translate: hi", "max_tokens": 512, "stream": false})
    );
    let request = &transport.requests()[0];
    assert_eq!(request.timeout, Some(Duration::from_secs(60)));
    assert_eq!(request.url, "https://backend.example.com/v1/endpoint");
}

#[tokio::test]
async fn stream_stops_at_done_sentinel() {
    let transport = ScriptedTransport::new(
        200,
        &["data: {\"a\":1}\n", "\n", "data: [DONE]\n", "data: {\"b\":2}\n"],
    );
    let dispatcher = Dispatcher::new(transport.clone());

    let stream = dispatcher
        .dispatch(&target("gpt-x"), DispatchRequest::prompt("p").streaming())
        .await
        .expect("stream dispatch")
        .into_stream()
        .expect("stream");
    let fragments: Vec<Fragment> = stream.map(|item| item.expect("fragment")).collect().await;

    assert_eq!(fragments, vec![Fragment::Json(json!({"a": 1}))]);
    assert_eq!(transport.only_body()["stream"], json!(true));
}

#[tokio::test]
async fn stream_passes_non_json_lines_through() {
    let transport = ScriptedTransport::new(
        200,
        &["data: not-json\n", "data: {\"b\":2}\n"],
    );
    let dispatcher = Dispatcher::new(transport);

    let mut stream = dispatcher
        .dispatch(
            &target("claude-2"),
            DispatchRequest::prompt("\n\nHuman: hi\n\nAssistant:").streaming(),
        )
        .await
        .expect("stream dispatch")
        .into_stream()
        .expect("stream");

    let first = stream.next().await.expect("first").expect("ok");
    assert_eq!(first, Fragment::Raw("not-json".to_string()));
    let second = stream.next().await.expect("second").expect("ok");
    assert_eq!(second.as_json(), Some(&json!({"b": 2})));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn request_without_shape_fails_before_network() {
    let transport = ScriptedTransport::ok_json(json!({}));
    let dispatcher = Dispatcher::new(transport.clone());

    let err = dispatcher
        .dispatch(
            &target("glm4.6"),
            DispatchRequest::default().with_parameter("max_tokens", json!(10)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LLMError::InvalidConfig { .. }));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn non_success_status_propagates_without_retry() {
    let transport = ScriptedTransport::new(
        500,
        &[r#"{"error": {"message": "internal", "code": "server_error"}}"#],
    );
    let dispatcher = Dispatcher::new(transport.clone());

    let err = dispatcher
        .dispatch(&target("ds-r1"), DispatchRequest::prompt("p"))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.to_string(), "http status 500: internal (server_error)");
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn caller_request_parameters_are_forwarded_untouched() {
    let transport = ScriptedTransport::ok_json(json!({}));
    let dispatcher = Dispatcher::new(transport.clone());
    let request = DispatchRequest::instances(vec![json!({"input": "a"}), json!({"input": "b"})])
        .with_parameter("max_tokens", json!(64))
        .with_parameter("temperature", json!(0.2));

    dispatcher
        .dispatch(&target("DS-batch"), request.clone())
        .await
        .expect("dispatch");

    let body = transport.only_body();
    assert_eq!(
        body["parameters"],
        json!({"max_tokens": 64, "temperature": 0.2})
    );
    assert_eq!(body["instances"], json!(request.instances.unwrap()));
}
