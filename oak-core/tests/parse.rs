use oak_core::openapi::{ParameterLocation, SecurityScheme};
use oak_core::types::{FailureActionOrReusable, FailureActionType, ParameterOrReusable, StepTarget};
use oak_core::{parse_document_str, parse_openapi_str, DocumentFormat, SourceDescription};

fn workflow_yaml() -> &'static str {
    r#"
arazzo: 1.0.1
info:
  title: Pet adoption
  version: 0.0.1
sourceDescriptions:
  - name: petstore
    url: ./petstore.yaml
    type: openapi
workflows:
  - workflowId: adoptPet
    inputs:
      type: object
      required: [petId]
      properties:
        petId: { type: integer }
    steps:
      - stepId: getPet
        operationId: getPetById
        parameters:
          - name: petId
            in: path
            value: $inputs.petId
        outputs:
          name: $response.body#/name
      - stepId: adopt
        operationPath: '{$sourceDescriptions.petstore.url}#/paths/~1pets~1{petId}~1adopt/post'
        parameters:
          - reference: $components.parameters.trace
        onFailure:
          - name: again
            type: retry
            retryAfter: 0.5
            retryLimit: 2
    outputs:
      petName: $steps.getPet.outputs.name
components:
  parameters:
    trace:
      name: X-Trace
      in: header
      value: abc
"#
}

#[test]
fn parses_arazzo_yaml() {
    let parsed = parse_document_str(workflow_yaml(), DocumentFormat::Auto).unwrap();
    assert_eq!(parsed.format, DocumentFormat::Yaml);

    let doc = parsed.document;
    let wf = doc.workflow("adoptPet").unwrap();
    assert_eq!(wf.steps.len(), 2);
    assert_eq!(wf.step_index("adopt"), Some(1));
    assert_eq!(wf.steps[0].target(), Some(StepTarget::OperationId("getPetById")));
    assert!(matches!(wf.steps[1].target(), Some(StepTarget::OperationPath(_))));

    let ParameterOrReusable::Parameter(p) = &wf.steps[0].parameters.as_ref().unwrap()[0] else {
        panic!("expected inline parameter");
    };
    assert_eq!(p.r#in, Some(ParameterLocation::Path));

    let ParameterOrReusable::Reusable(r) = &wf.steps[1].parameters.as_ref().unwrap()[0] else {
        panic!("expected reusable parameter");
    };
    assert_eq!(r.component_name("parameters"), Some("trace"));
    assert!(doc.component_parameter("trace").is_some());

    let FailureActionOrReusable::Action(a) = &wf.steps[1].on_failure.as_ref().unwrap()[0] else {
        panic!("expected inline failure action");
    };
    assert_eq!(a.action_type, FailureActionType::Retry);
    assert_eq!(a.retry_limit, Some(2));
}

#[test]
fn parses_arazzo_json() {
    let json = r#"{ "arazzo": "1.0.1", "info": { "title": "T", "version": "1" }, "sourceDescriptions": [ { "name": "s", "url": "https://example.com/openapi.json" } ], "workflows": [ { "workflowId": "w", "steps": [ { "stepId": "a", "workflowId": "other" } ] } ] }"#;
    let parsed = parse_document_str(json, DocumentFormat::Auto).unwrap();
    assert_eq!(parsed.format, DocumentFormat::Json);
    let wf = parsed.document.workflow("w").unwrap();
    assert_eq!(wf.steps[0].target(), Some(StepTarget::Workflow("other")));
    assert!(parsed.document.source_descriptions[0].is_openapi());
}

#[test]
fn openapi_yaml_keeps_declaration_order_and_numeric_keys() {
    let raw = parse_openapi_str(
        r#"
openapi: 3.0.3
info:
  title: Petstore API
  version: "1"
paths:
  /pets:
    post:
      operationId: createPet
      requestBody:
        content:
          text/plain: {}
          application/xml: {}
      responses:
        201:
          description: created
components:
  securitySchemes:
    apiKey:
      type: apiKey
      name: X-Api-Key
      in: header
    weird:
      type: mutualTLS
"#,
    )
    .unwrap();

    let content = raw
        .pointer("/paths/~1pets/post/requestBody/content")
        .and_then(|v| v.as_object())
        .unwrap();
    let keys: Vec<_> = content.keys().cloned().collect();
    assert_eq!(keys, vec!["text/plain", "application/xml"]);
    assert!(raw.pointer("/paths/~1pets/post/responses/201").is_some());

    let source = SourceDescription::new("petstore", raw);
    assert_eq!(source.title(), Some("Petstore API"));
    let schemes = source.security_schemes();
    assert_eq!(schemes.len(), 2);
    assert!(matches!(schemes[0].1, Ok(SecurityScheme::ApiKey { .. })));
    assert!(schemes[1].1.is_err());
}

#[test]
fn invalid_input_reports_first_attempted_format() {
    let err = parse_document_str("{ not json", DocumentFormat::Auto).unwrap_err();
    assert!(matches!(err, oak_core::ParseError::Json(_)));
}
