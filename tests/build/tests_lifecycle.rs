//! Rebuilds, supersession and cancellation.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::helpers::source_fixtures::*;
use crate::helpers::workspace::Workspace;
use weave::build::{BuildHandle, BuildState};
use weave::extract::{AspectDefinitionExtractor, ExtractionContext, ExtractorRegistry};
use weave::java::{JavaClass, JavaMethod, ProjectClassLoader, hierarchy};
use weave::model::AspectDefinition;
use weave::{ArtifactId, BuildConfig, ExtractError};

/// Cancels the build it is handed once extraction reaches `artifact`.
struct CancelOnExtract {
    artifact: ArtifactId,
    handle: Arc<OnceCell<BuildHandle>>,
}

impl AspectDefinitionExtractor for CancelOnExtract {
    fn name(&self) -> &'static str {
        "cancel-on-extract"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Vec<AspectDefinition>, ExtractError> {
        if ctx.config.artifact == self.artifact {
            if let Some(handle) = self.handle.get() {
                handle.cancel();
            }
        }
        Ok(Vec::new())
    }
}

fn cancelling_workspace(settings: BuildConfig) -> (Workspace, Arc<OnceCell<BuildHandle>>) {
    let handle = Arc::new(OnceCell::new());
    let extractors = ExtractorRegistry::with_defaults().with(CancelOnExtract {
        artifact: "a.xml".into(),
        handle: handle.clone(),
    });
    let ws = Workspace::with_extractors(
        &[
            ("a.xml", xml_before_advice(SERVICE_POINTCUT)),
            ("b.xml", xml_before_advice(SERVICE_POINTCUT)),
        ],
        acme_classes(),
        settings,
        extractors,
    );
    ws.build(&["a.xml", "b.xml"]);
    assert_eq!(ws.references().len(), 2);
    (ws, handle)
}

/// Schedule a build of a.xml then b.xml that cancels itself while
/// extracting a.xml.
fn build_cancelled_midway(ws: &Workspace, cell: &OnceCell<BuildHandle>) -> weave::build::BuildOutcome {
    let suspension = ws.scheduler.suspend();
    let handle = ws.scheduler.schedule(["a.xml".into(), "b.xml".into()]);
    cell.set(handle.clone()).unwrap();
    drop(suspension);
    handle.wait()
}

#[test]
fn test_rebuild_is_idempotent() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    ws.build(&["app.xml"]);
    let references = ws.weavings();
    let markers = ws.sink.markers();

    ws.build(&["app.xml"]);
    assert_eq!(ws.weavings(), references);
    assert_eq!(ws.sink.markers(), markers);
}

#[test]
fn test_rebuild_clears_stale_references_and_markers() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    ws.build(&["app.xml"]);
    assert_eq!(ws.references().len(), 1);
    assert!(!ws.sink.is_empty());

    ws.edit("app.xml", &xml_before_advice("execution(* com.acme.Repository.*(..))"));
    ws.build(&["app.xml"]);
    assert!(ws.references().is_empty());
    assert!(ws.sink.is_empty());
}

#[test]
fn test_fixed_pointcut_clears_problem() {
    let ws = Workspace::new(
        &[("app.xml", xml_before_advice("execution(* com.acme.Service.*(.."))],
        acme_classes(),
    );
    ws.build(&["app.xml"]);
    assert_eq!(ws.problems().len(), 1);

    ws.edit("app.xml", &xml_before_advice(SERVICE_POINTCUT));
    ws.build(&["app.xml"]);
    assert!(ws.problems().is_empty());
    assert_eq!(ws.references().len(), 1);
}

#[test]
fn test_removed_config_loses_its_references() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    ws.build(&["app.xml"]);
    assert_eq!(ws.references().len(), 1);

    ws.beans.remove_config(&ArtifactId::from("app.xml"));
    let outcome = ws.build(&["app.xml"]);
    assert!(outcome.is_completed());
    assert!(ws.references().is_empty());
    assert!(ws.sink.is_empty());
}

#[test]
fn test_superseded_build_never_publishes() {
    let ws = Workspace::new(
        &[
            ("a.xml", xml_before_advice(SERVICE_POINTCUT)),
            ("b.xml", xml_service_only()),
            ("c.xml", xml_service_only()),
        ],
        acme_classes(),
    );
    let suspension = ws.scheduler.suspend();
    let older = ws.scheduler.schedule(["a.xml".into(), "b.xml".into()]);
    let newer = ws
        .scheduler
        .schedule(["a.xml".into(), "b.xml".into(), "c.xml".into()]);
    drop(suspension);

    let older = older.wait();
    let newer = newer.wait();
    assert_eq!(older.state, BuildState::Cancelled);
    assert_eq!(older.markers, 0);
    assert_eq!(newer.state, BuildState::Completed);
    assert_eq!(newer.processed, 3);
    assert_eq!(ws.references().len(), 1);
    assert_eq!(ws.scheduler.pending(), 0);
}

#[test]
fn test_larger_older_build_survives_smaller_newer_one() {
    let ws = Workspace::new(
        &[("a.xml", xml_before_advice(SERVICE_POINTCUT)), ("b.xml", xml_service_only())],
        acme_classes(),
    );
    let suspension = ws.scheduler.suspend();
    let older = ws.scheduler.schedule(["a.xml".into(), "b.xml".into()]);
    let newer = ws.scheduler.schedule(["b.xml".into()]);
    drop(suspension);

    assert_eq!(older.wait().state, BuildState::Completed);
    assert!(newer.wait().state.is_finished());
    assert_eq!(ws.references().len(), 1);
}

#[test]
fn test_cancelled_build_leaves_markers_untouched() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    ws.build(&["app.xml"]);
    let markers = ws.sink.markers();
    assert!(!markers.is_empty());

    ws.edit("app.xml", &xml_before_advice("execution(* com.acme.Repository.*(..))"));
    let suspension = ws.scheduler.suspend();
    let handle = ws.scheduler.schedule(["app.xml".into()]);
    handle.cancel();
    drop(suspension);

    let outcome = handle.wait();
    assert_eq!(outcome.state, BuildState::Cancelled);
    assert_eq!(outcome.processed, 0);
    assert_eq!(ws.sink.markers(), markers);
    assert_eq!(ws.references().len(), 1);
}

#[test]
fn test_scheduled_build_completes_in_background() {
    let ws = Workspace::new(&[("app.xml", xml_before_advice(SERVICE_POINTCUT))], acme_classes());
    let handle = ws.scheduler.schedule(["app.xml".into()]);
    assert_eq!(handle.scope().len(), 1);

    let outcome = handle.wait();
    assert_eq!(outcome.id, handle.id());
    assert!(outcome.is_completed());
    assert_eq!(outcome.markers, 2);
    assert_eq!(ws.references().len(), 1);
}

#[test]
fn test_shared_import_rebuild_keeps_every_importer() {
    let a = beans(
        r#"  <import resource="shared.xml"/>
  <bean id="logger" class="com.acme.Logger"/>
  <aop:config>
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="execution(* com.acme.Service.*(..))"/>
    </aop:aspect>
  </aop:config>"#,
    );
    let b = beans(
        r#"  <import resource="shared.xml"/>
  <bean id="tracer" class="com.acme.Tracer"/>
  <aop:config>
    <aop:aspect ref="tracer">
      <aop:before method="trace" pointcut="execution(* com.acme.Service.*(..))"/>
    </aop:aspect>
  </aop:config>"#,
    );
    let classes = acme_classes().with_class(JavaClass::new("com.acme.Tracer").with_method(JavaMethod::new("trace")));
    let ws = Workspace::new(
        &[
            ("conf/a.xml", a),
            ("conf/b.xml", b),
            ("conf/shared.xml", xml_service_only()),
        ],
        classes,
    );
    ws.build(&["conf/a.xml", "conf/b.xml", "conf/shared.xml"]);
    let weavings = ws.weavings();
    assert_eq!(weavings, ["Logger.log() -> Service.doWork()", "Tracer.trace() -> Service.doWork()"]);
    let markers = ws.sink.len();

    let outcome = ws.build(&["conf/shared.xml"]);
    assert_eq!(outcome.processed, 3);
    assert_eq!(ws.weavings(), weavings);
    assert_eq!(ws.sink.len(), markers);
}

#[test]
fn test_build_releases_type_world_when_nothing_is_matched() {
    let source = beans(
        r#"  <bean id="notAdvice" class="com.acme.NotAdvice"/>
  <aop:config>
    <aop:advisor advice-ref="notAdvice" pointcut="execution(* *(..))"/>
  </aop:config>"#,
    );
    let classes = acme_classes().with_class(JavaClass::new("com.acme.NotAdvice"));
    let loader = classes.id();
    let ws = Workspace::new(&[("app.xml", source)], classes);

    let outcome = ws.build(&["app.xml"]);
    assert!(outcome.is_completed());
    assert!(ws.references().is_empty());
    assert_eq!(hierarchy::world_entries(loader), 0);
}

#[test]
fn test_cancel_midway_keeps_processed_artifacts() {
    let (ws, cell) = cancelling_workspace(BuildConfig::default());
    let markers = ws.sink.markers();
    ws.edit("a.xml", &xml_before_advice("execution(* com.acme.Repository.*(..))"));

    let outcome = build_cancelled_midway(&ws, &cell);
    assert_eq!(outcome.state, BuildState::Cancelled);
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.markers, 0);

    let references = ws.references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].artifact.as_str(), "b.xml");
    assert_eq!(ws.sink.markers(), markers);
    assert_eq!(ws.scheduler.pending(), 0);
}

#[test]
fn test_cancel_checked_between_definitions() {
    let settings = BuildConfig::default().with_cancellation_check_per_definition(true);
    let (ws, cell) = cancelling_workspace(settings);
    let markers = ws.sink.markers();

    let outcome = build_cancelled_midway(&ws, &cell);
    assert_eq!(outcome.state, BuildState::Cancelled);
    assert_eq!(outcome.processed, 0);

    let references = ws.references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].artifact.as_str(), "b.xml");
    assert_eq!(ws.sink.markers(), markers);
}
