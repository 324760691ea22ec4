use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use oak_core::{parse_document_str, parse_openapi_str, DocumentFormat, SourceSet};
use oak_runner::auth::ReqwestTokenEndpoint;
use oak_runner::env::MapEnv;
use oak_runner::executor::{
    HttpError, HttpExecutor, HttpRequest, HttpResponse, StepExecutor, WorkflowRunner,
    WorkflowStatus, ERROR_CONTEXT_KEY,
};
use oak_runner::RunnerConfig;
use serde_json::{json, Map, Value};

const PETSTORE: &str = r#"
openapi: 3.0.3
info:
  title: Petstore API
  version: "1"
servers:
  - url: https://petstore.example.com/v1
security:
  - bearer: []
paths:
  /pets:
    post:
      operationId: createPet
      requestBody:
        required: true
        content:
          application/json: {}
  /pets/{petId}:
    get:
      operationId: getPet
components:
  securitySchemes:
    bearer:
      type: http
      scheme: bearer
"#;

const FLOW: &str = r#"
arazzo: 1.0.1
info:
  title: Adoption
  version: "1"
sourceDescriptions:
  - name: petstore
    url: ./petstore.yaml
    type: openapi
workflows:
  - workflowId: adoptPet
    inputs:
      type: object
      required: [name]
      properties:
        name: { type: string }
        kind: { type: string, default: dog }
    steps:
      - stepId: step1
        operationId: createPet
        requestBody:
          contentType: application/json
          payload:
            name: $inputs.name
            kind: $inputs.kind
        successCriteria:
          - condition: $statusCode == 201
        onFailure:
          - name: retryOnce
            type: retry
            retryAfter: 1
            retryLimit: 1
            criteria:
              - condition: $statusCode == 503
        outputs:
          id: $response.body#/id
      - stepId: step2
        operationId: getPet
        parameters:
          - name: petId
            in: path
            value: $steps.step1.outputs.id
        outputs:
          name: $response.body.name
    outputs:
      petId: $steps.step1.outputs.id
      petName: $steps.step2.outputs.name
  - workflowId: createOnly
    steps:
      - stepId: create
        operationId: createPet
        requestBody:
          payload: { name: Solo }
        successCriteria:
          - condition: $statusCode == 201
        onSuccess:
          - name: stop
            type: end
        outputs:
          id: $response.body#/id
      - stepId: never
        operationId: getPet
        parameters:
          - name: petId
            value: "{$steps.create.outputs.id}"
  - workflowId: wrapper
    steps:
      - stepId: adopt
        workflowId: adoptPet
        parameters:
          - name: name
            value: Rex
    outputs:
      adopted: $steps.adopt.outputs.petName
  - workflowId: slowRetry
    steps:
      - stepId: create
        operationId: createPet
        requestBody:
          payload: { name: Slow }
        successCriteria:
          - condition: $statusCode == 201
        onFailure:
          - name: waitForever
            type: retry
            retryAfter: 1.0e+30
            retryLimit: 1
  - workflowId: skipAhead
    steps:
      - stepId: create
        operationId: createPet
        requestBody:
          payload: { name: Solo }
        successCriteria:
          - condition: $statusCode == 201
        onSuccess:
          - name: jump
            type: goto
            stepId: fetch
        outputs:
          id: $response.body#/id
      - stepId: skipped
        operationId: createPet
        requestBody:
          payload: { name: Other }
      - stepId: fetch
        operationId: getPet
        parameters:
          - name: petId
            in: path
            value: $steps.create.outputs.id
        outputs:
          name: $response.body.name
  - workflowId: fallback
    steps:
      - stepId: lookup
        operationId: getPet
        parameters:
          - name: petId
            in: path
            value: p-1
        onFailure:
          - name: createInstead
            type: goto
            stepId: create
      - stepId: skipped
        operationId: getPet
        parameters:
          - name: petId
            in: path
            value: p-2
      - stepId: create
        operationId: createPet
        requestBody:
          payload: { name: Rex }
        successCriteria:
          - condition: $statusCode == 201
  - workflowId: loopBack
    steps:
      - stepId: create
        operationId: createPet
        requestBody:
          payload: { name: Solo }
        successCriteria:
          - condition: $statusCode == 201
      - stepId: again
        operationId: getPet
        parameters:
          - name: petId
            in: path
            value: p-1
        onSuccess:
          - name: back
            type: goto
            stepId: create
  - workflowId: gotoNowhere
    steps:
      - stepId: create
        operationId: createPet
        requestBody:
          payload: { name: Solo }
        successCriteria:
          - condition: $statusCode == 201
        onSuccess:
          - name: lost
            type: goto
            stepId: ghost
"#;

/// Responses keyed by `METHOD url`; the last queued response repeats.
#[derive(Default)]
struct MockHttp {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse, HttpError>>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
    fn route(self, key: &str, status: u16, body: Value) -> Self {
        self.push(key, Ok(HttpResponse {
            status_code: status,
            headers: Default::default(),
            body,
        }));
        self
    }

    fn fail(self, key: &str, err: HttpError) -> Self {
        self.push(key, Err(err));
        self
    }

    fn push(&self, key: &str, r: Result<HttpResponse, HttpError>) {
        self.routes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(r);
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpExecutor for MockHttp {
    async fn execute_request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let key = format!("{} {}", request.method, request.url);
        self.requests.lock().unwrap().push(request);
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(HttpResponse {
                status_code: 404,
                headers: Default::default(),
                body: json!({ "message": "no route" }),
            }),
        }
    }
}

fn runner(http: Arc<MockHttp>) -> WorkflowRunner {
    let doc = parse_document_str(FLOW, DocumentFormat::Yaml).unwrap().document;
    let sources = SourceSet::from_documents([("petstore", parse_openapi_str(PETSTORE).unwrap())]);
    let env = MapEnv::new().with("PETSTORE_BEARER_TOKEN", "t0k");
    let steps = StepExecutor::new(
        Arc::new(sources),
        Arc::new(env),
        Arc::new(ReqwestTokenEndpoint::new(reqwest::Client::new(), Duration::from_secs(5))),
        http,
    );
    WorkflowRunner::new(Arc::new(doc), steps, RunnerConfig::default())
}

fn inputs(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("inputs must be an object"),
    }
}

const CREATE: &str = "POST https://petstore.example.com/v1/pets";
const GET_P1: &str = "GET https://petstore.example.com/v1/pets/p-1";

#[tokio::test]
async fn two_step_workflow_threads_outputs() {
    let http = Arc::new(
        MockHttp::default()
            .route(CREATE, 201, json!({ "id": "p-1" }))
            .route(GET_P1, 200, json!({ "id": "p-1", "name": "Rex" })),
    );
    let result = runner(http.clone())
        .execute_workflow("adoptPet", inputs(json!({ "name": "Rex" })), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::WorkflowComplete, "{:?}", result.error);
    assert_eq!(result.outputs["petId"], json!("p-1"));
    assert_eq!(result.outputs["petName"], json!("Rex"));
    assert_eq!(result.inputs.as_ref().unwrap()["kind"], json!("dog"));

    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    let body = requests[0].parameters.body.as_ref().unwrap();
    assert_eq!(body.payload, json!({ "name": "Rex", "kind": "dog" }));
    assert_eq!(body.content_type, "application/json");
    assert_eq!(requests[0].auth.len(), 1);
    assert_eq!(requests[0].auth[0].auth_value.expose(), "Bearer t0k");
    assert_eq!(requests[1].parameters.path["petId"], json!("p-1"));
}

#[tokio::test]
async fn failed_step_stops_the_run() {
    let http = Arc::new(MockHttp::default().route(CREATE, 404, json!({ "message": "gone" })));
    let result = runner(http.clone())
        .execute_workflow("adoptPet", inputs(json!({ "name": "Rex" })), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Error);
    assert!(result.error.as_deref().unwrap().contains("step1"));
    let step_outputs = result.step_outputs.unwrap();
    assert_eq!(step_outputs["step1"][ERROR_CONTEXT_KEY]["http_code"], json!(404));
    assert!(!step_outputs.contains_key("step2"));
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_action_reruns_the_step() {
    let http = Arc::new(
        MockHttp::default()
            .route(CREATE, 503, json!({}))
            .route(CREATE, 201, json!({ "id": "p-1" }))
            .route(GET_P1, 200, json!({ "name": "Rex" })),
    );
    let result = runner(http.clone())
        .execute_workflow("adoptPet", inputs(json!({ "name": "Rex" })), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::WorkflowComplete, "{:?}", result.error);
    assert_eq!(http.requests().len(), 3);
    assert!(!result.step_outputs.unwrap()["step1"].contains_key(ERROR_CONTEXT_KEY));
}

#[tokio::test]
async fn end_action_finishes_early() {
    let http = Arc::new(MockHttp::default().route(CREATE, 201, json!({ "id": "p-9" })));
    let result = runner(http.clone())
        .execute_workflow("createOnly", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::WorkflowComplete);
    assert_eq!(http.requests().len(), 1);
    assert!(!result.step_outputs.unwrap().contains_key("never"));
}

#[tokio::test]
async fn nested_workflow_outputs_become_step_outputs() {
    let http = Arc::new(
        MockHttp::default()
            .route(CREATE, 201, json!({ "id": "p-1" }))
            .route(GET_P1, 200, json!({ "name": "Rex" })),
    );
    let result = runner(http)
        .execute_workflow("wrapper", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::WorkflowComplete, "{:?}", result.error);
    assert_eq!(result.outputs["adopted"], json!("Rex"));
}

#[tokio::test]
async fn missing_required_input_is_an_error() {
    let http = Arc::new(MockHttp::default());
    let result = runner(http.clone())
        .execute_workflow("adoptPet", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Error);
    assert!(result.error.unwrap().contains("name"));
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn transport_failure_is_an_error() {
    let http = Arc::new(MockHttp::default().fail(CREATE, HttpError::Timeout));
    let result = runner(http)
        .execute_workflow("adoptPet", inputs(json!({ "name": "Rex" })), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Error);
    assert!(result.error.unwrap().contains("timeout"));
}

#[tokio::test]
async fn unknown_workflow_is_none() {
    let http = Arc::new(MockHttp::default());
    assert!(runner(http)
        .execute_workflow("nope", Map::new(), None)
        .await
        .is_none());
}

#[tokio::test]
async fn unrepresentable_retry_delay_is_an_error() {
    let http = Arc::new(MockHttp::default().route(CREATE, 503, json!({})));
    let result = runner(http.clone())
        .execute_workflow("slowRetry", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Error);
    assert!(result.error.unwrap().contains("retryAfter"));
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn goto_on_success_skips_ahead() {
    let http = Arc::new(
        MockHttp::default()
            .route(CREATE, 201, json!({ "id": "p-1" }))
            .route(GET_P1, 200, json!({ "name": "Rex" })),
    );
    let result = runner(http.clone())
        .execute_workflow("skipAhead", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::WorkflowComplete, "{:?}", result.error);
    let step_outputs = result.step_outputs.unwrap();
    assert!(!step_outputs.contains_key("skipped"));
    assert_eq!(step_outputs["fetch"]["name"], json!("Rex"));
    assert_eq!(http.requests().len(), 2);
}

#[tokio::test]
async fn goto_on_failure_records_outputs_and_jumps() {
    let http = Arc::new(MockHttp::default().route(CREATE, 201, json!({ "id": "p-1" })));
    let result = runner(http.clone())
        .execute_workflow("fallback", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::WorkflowComplete, "{:?}", result.error);
    let step_outputs = result.step_outputs.unwrap();
    assert_eq!(step_outputs["lookup"][ERROR_CONTEXT_KEY]["http_code"], json!(404));
    assert!(!step_outputs.contains_key("skipped"));
    assert!(step_outputs.contains_key("create"));

    let urls: Vec<String> = http.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        [
            "https://petstore.example.com/v1/pets/p-1",
            "https://petstore.example.com/v1/pets",
        ]
    );
}

#[tokio::test]
async fn goto_to_a_completed_step_is_rejected() {
    let http = Arc::new(
        MockHttp::default()
            .route(CREATE, 201, json!({ "id": "p-1" }))
            .route(GET_P1, 200, json!({ "name": "Rex" })),
    );
    let result = runner(http.clone())
        .execute_workflow("loopBack", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Error);
    assert!(result.error.unwrap().contains("already completed"));
    assert_eq!(http.requests().len(), 2);
}

#[tokio::test]
async fn goto_to_an_unknown_step_is_rejected() {
    let http = Arc::new(MockHttp::default().route(CREATE, 201, json!({ "id": "p-1" })));
    let result = runner(http)
        .execute_workflow("gotoNowhere", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Error);
    assert!(result.error.unwrap().contains("'ghost' is not a step"));
}
