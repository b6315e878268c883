//! End-to-end builds over XML and annotation configurations.

use crate::helpers::source_fixtures::*;
use crate::helpers::workspace::Workspace;
use weave::beans::{ConfigSet, StaticBeansModel, read_beans_config};
use weave::build::BuildState;
use weave::diagnostics::{MarkerKind, Severity, codes};
use weave::model::AdviceKind;
use weave::BuildConfig;

// =============================================================================
// XML ADVICE
// =============================================================================

#[test]
fn test_xml_before_advice() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    let outcome = ws.build(&["app.xml"]);

    assert_eq!(outcome.state, BuildState::Completed);
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.failures, 0);

    let references = ws.references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].kind, AdviceKind::Before);
    assert_eq!(references[0].target.to_string(), "Service.doWork()");
    assert_eq!(references[0].source.to_string(), "Logger.log()");
    assert!(ws.problems().is_empty());
}

#[test]
fn test_reference_markers_anchor_both_ends() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    ws.build(&["app.xml"]);

    let markers = ws.markers_on("app.xml");
    let source = markers
        .iter()
        .find(|m| m.kind == MarkerKind::SourceBeforeAdvice)
        .unwrap();
    assert_eq!(source.line, 8);
    assert_eq!(&*source.message, "advises Service.doWork()");

    let target = markers.iter().find(|m| m.kind == MarkerKind::BeforeAdvice).unwrap();
    assert_eq!(target.line, 5);
    assert_eq!(&*target.message, "advised by Logger.log()");
}

#[test]
fn test_reference_markers_disabled() {
    let ws = Workspace::with_settings(
        &[("app.xml", xml_before_advice(SERVICE_POINTCUT))],
        acme_classes(),
        BuildConfig::default().with_reference_markers(false),
    );
    let outcome = ws.build(&["app.xml"]);
    assert_eq!(ws.references().len(), 1);
    assert_eq!(outcome.markers, 0);
    assert!(ws.sink.is_empty());
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_malformed_pointcut() {
    let ws = Workspace::new(
        &[("app.xml", xml_before_advice("execution(* com.acme.Service.*(.."))],
        acme_classes(),
    );
    let outcome = ws.build(&["app.xml"]);

    assert_eq!(outcome.state, BuildState::Completed);
    assert!(ws.references().is_empty());

    let problems = ws.problems();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].severity, Severity::Error);
    assert_eq!(problems[0].code, Some(codes::MALFORMED_POINTCUT));
    assert_eq!(problems[0].resource.as_str(), "app.xml");
    assert_eq!(problems[0].line, 8);
}

#[test]
fn test_missing_supertype_reported_on_bean() {
    let source = beans(
        r#"  <bean id="logger" class="com.acme.Logger"/>
  <bean id="orphan" class="com.acme.Orphan"/>
  <aop:config>
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="execution(* *(..))"/>
    </aop:aspect>
  </aop:config>"#,
    );
    let classes = acme_classes().with_class(
        weave::java::JavaClass::new("com.acme.Orphan").extending("com.acme.GoneBase"),
    );
    let ws = Workspace::new(&[("app.xml", source)], classes);
    ws.build(&["app.xml"]);

    let problems = ws.problems();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, Some(codes::CLASS_NOT_FOUND));
    assert_eq!(problems[0].line, 5);
    assert!(problems[0].message.contains("com.acme.GoneBase"));
}

#[test]
fn test_failure_does_not_stop_other_definitions() {
    let source = beans(
        r#"  <bean id="logger" class="com.acme.Logger"/>
  <bean id="service" class="com.acme.Service"/>
  <aop:config>
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="execution(* com.acme.Service.*(.."/>
      <aop:after method="log" pointcut="execution(* com.acme.Service.*(..))"/>
    </aop:aspect>
  </aop:config>"#,
    );
    let ws = Workspace::new(&[("app.xml", source)], acme_classes());
    let outcome = ws.build(&["app.xml"]);

    assert_eq!(outcome.failures, 1);
    let references = ws.references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].kind, AdviceKind::After);
}

// =============================================================================
// SCOPE
// =============================================================================

#[test]
fn test_config_set_fan_out() {
    let beans = StaticBeansModel::new()
        .with_config(read_beans_config("x.xml", "shop", &xml_aspect_only(SERVICE_POINTCUT)).unwrap())
        .with_config(read_beans_config("y.xml", "shop", &xml_service_only()).unwrap())
        .with_config_set(ConfigSet::new("context", "shop").with_config("x.xml").with_config("y.xml"));
    let ws = Workspace::from_model(beans, acme_classes(), BuildConfig::default());

    let outcome = ws.build(&["x.xml"]);
    assert_eq!(outcome.processed, 2);

    let references = ws.references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].artifact.as_str(), "y.xml");
    assert_eq!(references[0].definition.resource.as_str(), "x.xml");

    let target_markers = ws.markers_on("y.xml");
    assert_eq!(target_markers.len(), 1);
    assert_eq!(target_markers[0].kind, MarkerKind::BeforeAdvice);
}

#[test]
fn test_unrelated_configs_do_not_see_each_other() {
    let ws = Workspace::new(
        &[
            ("x.xml", xml_aspect_only(SERVICE_POINTCUT)),
            ("y.xml", xml_service_only()),
        ],
        acme_classes(),
    );
    ws.build(&["x.xml", "y.xml"]);
    assert!(ws.references().is_empty());
}

#[test]
fn test_imported_beans_are_candidates() {
    let main = beans(
        r#"  <import resource="services.xml"/>
  <bean id="logger" class="com.acme.Logger"/>
  <aop:config>
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="execution(* com.acme.Service.*(..))"/>
    </aop:aspect>
  </aop:config>"#,
    );
    let ws = Workspace::new(
        &[("conf/main.xml", main), ("conf/services.xml", xml_service_only())],
        acme_classes(),
    );
    ws.build(&["conf/main.xml"]);
    assert_eq!(ws.weavings(), ["Logger.log() -> Service.doWork()"]);
}

// =============================================================================
// PROXY ELIGIBILITY
// =============================================================================

#[test]
fn test_self_exclusion() {
    let ws = Workspace::new(
        &[("app.xml", xml_before_advice("execution(* com.acme.*.*(..))"))],
        acme_classes(),
    );
    ws.build(&["app.xml"]);
    assert_eq!(ws.weavings(), ["Logger.log() -> Service.doWork()"]);
}

#[test]
fn test_final_class_with_proxy_target_class() {
    let source = beans(
        r#"  <bean id="logger" class="com.acme.Logger"/>
  <bean id="service" class="com.acme.Service"/>
  <aop:config proxy-target-class="true">
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="execution(* com.acme.Service.*(..))"/>
    </aop:aspect>
  </aop:config>"#,
    );
    let ws = Workspace::new(&[("app.xml", source)], final_service_classes());
    ws.build(&["app.xml"]);
    assert!(ws.references().is_empty());
    assert!(ws.problems().is_empty());
}

#[test]
fn test_interface_fallback() {
    let ws = Workspace::new(
        &[("app.xml", xml_before_advice("execution(* com.acme.Api.call())"))],
        interface_classes(),
    );
    ws.build(&["app.xml"]);
    assert_eq!(ws.weavings(), ["Logger.log() -> Service.call()"]);
}

// =============================================================================
// ANNOTATIONS AND TRANSACTIONS
// =============================================================================

#[test]
fn test_annotation_aspect_with_autoproxy() {
    let source = beans(
        r#"  <aop:aspectj-autoproxy/>
  <bean id="audit" class="com.acme.Audit"/>
  <bean id="service" class="com.acme.Service"/>"#,
    );
    let ws = Workspace::new(&[("app.xml", source)], annotated_aspect_classes());
    ws.build(&["app.xml"]);
    assert_eq!(ws.weavings(), ["Audit.audit() -> Service.doWork()"]);
}

#[test]
fn test_annotation_aspect_without_autoproxy_is_ignored() {
    let source = beans(
        r#"  <bean id="audit" class="com.acme.Audit"/>
  <bean id="service" class="com.acme.Service"/>"#,
    );
    let ws = Workspace::new(&[("app.xml", source)], annotated_aspect_classes());
    ws.build(&["app.xml"]);
    assert!(ws.references().is_empty());
}

#[test]
fn test_autoproxy_in_config_set_sibling_enables_aspects() {
    let autoproxy = beans("  <aop:aspectj-autoproxy/>");
    let aspects = beans(
        r#"  <bean id="audit" class="com.acme.Audit"/>
  <bean id="service" class="com.acme.Service"/>"#,
    );

    let model = StaticBeansModel::new()
        .with_config(read_beans_config("x.xml", "shop", &autoproxy).unwrap())
        .with_config(read_beans_config("y.xml", "shop", &aspects).unwrap())
        .with_config_set(ConfigSet::new("context", "shop").with_config("x.xml").with_config("y.xml"));
    let ws = Workspace::from_model(model, annotated_aspect_classes(), BuildConfig::default());
    ws.build(&["y.xml"]);
    assert_eq!(ws.weavings(), ["Audit.audit() -> Service.doWork()"]);

    let unrelated = Workspace::new(&[("x.xml", autoproxy), ("y.xml", aspects)], annotated_aspect_classes());
    unrelated.build(&["y.xml"]);
    assert!(unrelated.references().is_empty());
}

#[test]
fn test_transactional_annotation_driven() {
    use weave::java::{Annotation, JavaClass, JavaMethod};

    let source = beans(
        r#"  <tx:annotation-driven/>
  <bean id="bank" class="com.acme.Bank"/>"#,
    );
    let classes = acme_classes().with_class(
        JavaClass::new("com.acme.Bank")
            .with_method(
                JavaMethod::new("transfer")
                    .annotated(Annotation::new("org.springframework.transaction.annotation.Transactional")),
            )
            .with_method(JavaMethod::new("balance")),
    );
    let ws = Workspace::new(&[("app.xml", source)], classes);
    ws.build(&["app.xml"]);

    let references = ws.references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].kind, AdviceKind::Around);
    assert_eq!(references[0].target.to_string(), "Bank.transfer()");
}
