mod common;

use std::path::PathBuf;
use std::sync::Arc;

use easycut_common::error::{EasycutError, ErrorKind};
use easycut_project_model::{
    AdvancedOptions, FilterSpec, RenderSessionConfig, Scheme, WorkItem, WorkItemProperties,
};
use easycut_render_engine::{FragmentState, RenderEvent, RenderSessionController, SessionState};

use common::{
    arg_after, collect_events, master_fragments_on_disk, source_items, temp_workdir,
    wait_for_job_start, FakeBackend,
};

#[tokio::test]
async fn render_produces_one_fragment_per_item_and_master_output() {
    let workdir = temp_workdir("render_ok");
    let backend = Arc::new(FakeBackend::new());
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    let items = source_items(&workdir, 3);
    controller.set_work_items(items.clone()).unwrap();

    let outcome = controller.render().unwrap().wait().await.unwrap();

    assert_eq!(
        master_fragments_on_disk(&workdir),
        vec!["master0.mp4", "master1.mp4", "master2.mp4"]
    );
    assert_eq!(outcome.output, workdir.root().join("masterOutput.mp4"));
    assert_eq!(outcome.fragments.len(), 3);
    assert_eq!(controller.state(), SessionState::Completed);

    let manifest = std::fs::read_to_string(workdir.manifest_path()).unwrap();
    assert_eq!(manifest, "file master0.mp4\nfile master1.mp4\nfile master2.mp4\n");

    // Master content is the fragments joined in work-item order.
    let master = std::fs::read_to_string(&outcome.output).unwrap();
    let expected: String = items
        .iter()
        .map(|item| format!("[{}]", item.file.display()))
        .collect();
    assert_eq!(master, expected);

    let fragments = controller.fragments();
    assert_eq!(fragments.len(), 3);
    assert!(fragments.all_complete());
    assert_eq!(backend.concat_invocations().len(), 1);
}

#[tokio::test]
async fn empty_registry_fails_before_any_job() {
    let workdir = temp_workdir("render_empty");
    let backend = Arc::new(FakeBackend::new());
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());

    let err = controller.render().unwrap().wait().await.unwrap_err();

    assert!(matches!(err, EasycutError::EmptyInput));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(backend.invocations().is_empty());
    assert!(master_fragments_on_disk(&workdir).is_empty());
    assert!(controller.fragments().is_empty());
    assert_eq!(controller.state(), SessionState::Failed);
}

#[tokio::test]
async fn failure_stops_sequence_and_skips_concat() {
    let workdir = temp_workdir("render_fail");
    let backend = Arc::new(FakeBackend::failing_on("master1.mp4"));
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    controller.set_work_items(source_items(&workdir, 3)).unwrap();

    let mut handle = controller.render().unwrap();
    let events = collect_events(&mut handle).await;
    let err = handle.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::JobExecution);
    assert!(err.to_string().contains("work item 1"));
    assert!(err.to_string().contains("simulated encoder failure"));

    assert_eq!(master_fragments_on_disk(&workdir), vec!["master0.mp4"]);
    assert!(!workdir.root().join("masterOutput.mp4").exists());
    assert!(backend.concat_invocations().is_empty());
    assert_eq!(backend.fragment_invocations().len(), 2);

    let states: Vec<FragmentState> = controller
        .fragments()
        .records()
        .iter()
        .map(|r| r.state)
        .collect();
    assert_eq!(states, vec![FragmentState::Complete, FragmentState::Failed]);
    assert_eq!(controller.state(), SessionState::Failed);

    assert!(matches!(events.last(), Some(RenderEvent::Failed { message }) if message.contains("work item 1")));
    assert!(!events
        .iter()
        .any(|e| matches!(e, RenderEvent::JobStarted { index: 2, .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, RenderEvent::FragmentRendered { index: 1, .. })));
}

#[tokio::test]
async fn events_arrive_in_pipeline_order() {
    let workdir = temp_workdir("render_events");
    let controller = RenderSessionController::new(Arc::new(FakeBackend::new()), workdir.clone());
    controller.set_work_items(source_items(&workdir, 3)).unwrap();

    let mut handle = controller.render().unwrap();
    let events = collect_events(&mut handle).await;
    handle.wait().await.unwrap();

    assert_eq!(events.first(), Some(&RenderEvent::Started { total_items: 3 }));
    assert!(matches!(events.last(), Some(RenderEvent::Completed { .. })));

    let started: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::JobStarted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![0, 1, 2]);

    let rendered: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::FragmentRendered { file_name, .. } => Some(file_name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(rendered, vec!["master0.mp4", "master1.mp4", "master2.mp4"]);

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents.len(), 3);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));

    let concat_pos = events
        .iter()
        .position(|e| matches!(e, RenderEvent::Concatenating { fragments: 3 }))
        .unwrap();
    let last_fragment_pos = events
        .iter()
        .position(|e| matches!(e, RenderEvent::FragmentRendered { index: 2, .. }))
        .unwrap();
    assert!(last_fragment_pos < concat_pos);
    assert!(events
        .iter()
        .any(|e| matches!(e, RenderEvent::Diagnostic { line, .. } if line == "fake: encoding")));
}

#[tokio::test]
async fn rerender_reuses_fragment_names() {
    let workdir = temp_workdir("render_twice");
    let controller = RenderSessionController::new(Arc::new(FakeBackend::new()), workdir.clone());
    controller.set_work_items(source_items(&workdir, 2)).unwrap();

    controller.render().unwrap().wait().await.unwrap();
    let first = controller.fragments().file_names();
    controller.render().unwrap().wait().await.unwrap();
    let second = controller.fragments().file_names();

    assert_eq!(first, second);
    assert_eq!(second, vec!["master0.mp4", "master1.mp4"]);
    assert_eq!(controller.state(), SessionState::Completed);
}

#[tokio::test]
async fn shorter_rerender_leaves_only_its_own_fragments() {
    let workdir = temp_workdir("render_shrink");
    let backend = Arc::new(FakeBackend::new());
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    let items = source_items(&workdir, 3);

    controller.set_work_items(items.clone()).unwrap();
    controller.render().unwrap().wait().await.unwrap();
    assert_eq!(master_fragments_on_disk(&workdir).len(), 3);

    controller.set_work_items(items[..1].to_vec()).unwrap();
    controller.render().unwrap().wait().await.unwrap();

    assert_eq!(master_fragments_on_disk(&workdir), vec!["master0.mp4"]);
    assert!(workdir.manifest_path().exists());
    let master = std::fs::read_to_string(workdir.root().join("masterOutput.mp4")).unwrap();
    assert_eq!(master, format!("[{}]", items[0].file.display()));
}

#[tokio::test]
async fn mutations_are_rejected_while_rendering() {
    let workdir = temp_workdir("render_busy");
    let (backend, gate) = FakeBackend::gated();
    let backend = Arc::new(backend);
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    controller.set_work_items(source_items(&workdir, 2)).unwrap();

    let mut handle = controller.render().unwrap();
    assert_eq!(controller.state(), SessionState::Rendering);
    wait_for_job_start(&mut handle, 0).await;

    let err = controller.render().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    let err = controller.set_work_items(Vec::<WorkItem>::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    let err = controller.add_work_item(WorkItem::new("late.mov")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    let err = controller
        .add_work_item_filter(0, FilterSpec::expr("hflip"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);

    // Scheme changes are accepted but only apply to the next render.
    controller.set_scheme(Scheme {
        fps: 60.0,
        ..Scheme::default()
    });

    gate.add_permits(10);
    handle.wait().await.unwrap();

    let fragment_runs = backend.fragment_invocations();
    assert_eq!(fragment_runs.len(), 2);
    for run in &fragment_runs {
        assert_eq!(arg_after(&run.args, "-r"), Some("24"));
    }
    assert_eq!(controller.work_items().len(), 2);
    assert_eq!(controller.scheme().fps, 60.0);
    assert!(controller.add_work_item(WorkItem::new("late.mov")).is_ok());
}

#[tokio::test]
async fn workdir_is_locked_across_controllers() {
    let workdir = temp_workdir("render_lock");
    let (backend, gate) = FakeBackend::gated();
    let first = RenderSessionController::new(Arc::new(backend), workdir.clone());
    first.set_work_items(source_items(&workdir, 1)).unwrap();
    let second = RenderSessionController::new(Arc::new(FakeBackend::new()), workdir.clone());
    second.set_work_items(source_items(&workdir, 1)).unwrap();

    let handle = first.render().unwrap();
    let err = second.render().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    assert_eq!(second.state(), SessionState::Idle);

    gate.add_permits(10);
    handle.wait().await.unwrap();
    assert!(second.render().unwrap().wait().await.is_ok());
}

#[tokio::test]
async fn cancel_stops_running_job() {
    let workdir = temp_workdir("render_cancel");
    let (backend, _gate) = FakeBackend::gated();
    let backend = Arc::new(backend);
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    controller.set_work_items(source_items(&workdir, 3)).unwrap();

    let mut handle = controller.render().unwrap();
    wait_for_job_start(&mut handle, 0).await;
    handle.cancel();
    let err = handle.wait().await.unwrap_err();

    assert!(matches!(err, EasycutError::Cancelled));
    assert_eq!(controller.state(), SessionState::Failed);
    assert_eq!(backend.invocations().len(), 1);
    assert!(master_fragments_on_disk(&workdir).is_empty());
    assert_eq!(
        controller.fragments().records()[0].state,
        FragmentState::Failed
    );

    // The workdir lock was released with the cancelled render.
    assert!(workdir.lock().is_ok());
}

#[tokio::test]
async fn missing_input_fails_its_job() {
    let workdir = temp_workdir("render_missing");
    let backend = Arc::new(FakeBackend::new());
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    let mut items = source_items(&workdir, 1);
    items.push(WorkItem::new(workdir.root().join("gone.mov")));
    controller.set_work_items(items).unwrap();

    let err = controller.render().unwrap().wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::JobExecution);
    assert!(err.to_string().contains("gone.mov"));
    assert_eq!(backend.fragment_invocations().len(), 1);
    assert_eq!(controller.fragments().len(), 1);
}

#[tokio::test]
async fn complex_item_passes_graph_verbatim() {
    let workdir = temp_workdir("render_complex");
    let backend = Arc::new(FakeBackend::new());
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    let sources = source_items(&workdir, 2);
    let graph = "[0:v]scale=100:-1[logo];[1:v][logo]overlay=W-w-10:10";
    let item = WorkItem::with_properties(
        sources[1].file.clone(),
        WorkItemProperties {
            advanced: Some(AdvancedOptions {
                inputs: vec![sources[0].file.clone()],
                complex: true,
            }),
            complex_filter: Some(graph.to_string()),
            ..Default::default()
        },
    );

    let config = RenderSessionConfig::builder()
        .work_item(item)
        .output(workdir.root().join("exports").join("final"))
        .build()
        .unwrap();
    let outcome = controller.render_with(config).unwrap().wait().await.unwrap();

    assert_eq!(outcome.output, workdir.root().join("exports").join("final.mp4"));
    let run = &backend.fragment_invocations()[0];
    assert_eq!(arg_after(&run.args, "-filter_complex"), Some(graph));
    assert_eq!(arg_after(&run.args, "-c:v"), None);
    assert_eq!(arg_after(&run.args, "-r"), None);
}

#[tokio::test]
async fn invalid_scheme_is_rejected_at_start() {
    let workdir = temp_workdir("render_bad_scheme");
    let controller = RenderSessionController::new(Arc::new(FakeBackend::new()), workdir.clone());
    controller.set_work_items(source_items(&workdir, 1)).unwrap();
    controller.set_scheme(Scheme {
        size: "big".to_string(),
        ..Scheme::default()
    });

    let err = controller.render().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn convert_to_compliant_uses_current_scheme() {
    let workdir = temp_workdir("convert");
    let backend = Arc::new(FakeBackend::new());
    let controller = RenderSessionController::new(backend.clone(), workdir.clone());
    let source = source_items(&workdir, 1).remove(0).file;
    controller.set_scheme(Scheme {
        format: ".mkv".to_string(),
        size: "640x360".to_string(),
        ..Scheme::default()
    });

    let output = controller.convert_to_compliant(&source, "clip").await.unwrap();
    assert_eq!(output, workdir.root().join("clip.mkv"));
    assert!(output.exists());

    let run = &backend.invocations()[0];
    assert!(arg_after(&run.args, "-vf").unwrap().contains("scale=640:360"));
    assert_eq!(arg_after(&run.args, "-c:v"), Some("libx264"));

    let err = controller
        .convert_to_compliant(&PathBuf::from("/nonexistent/a.mov"), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, EasycutError::FileNotFound { .. }));
}

#[tokio::test]
async fn get_meta_reports_probe_results() {
    let workdir = temp_workdir("meta");
    let controller = RenderSessionController::new(Arc::new(FakeBackend::new()), workdir.clone());
    let source = source_items(&workdir, 1).remove(0).file;

    let info = controller.get_meta(&source).await.unwrap();
    assert_eq!(info.duration_secs(), Some(3.0));
    assert_eq!(info.dimensions(), Some((640, 360)));

    let err = controller
        .get_meta(&workdir.root().join("missing.mov"))
        .await
        .unwrap_err();
    assert!(matches!(err, EasycutError::FileNotFound { .. }));
}

#[tokio::test]
async fn sequencer_resumes_from_start_index() {
    use easycut_render_engine::{CancelSignal, NoopObserver, RenderContext, RenderSequencer};

    let workdir = temp_workdir("sequencer_resume");
    let backend = Arc::new(FakeBackend::new());
    let ctx = RenderContext {
        scheme: Scheme::default(),
        work_items: source_items(&workdir, 3).into(),
        workdir: workdir.clone(),
        fragments: Default::default(),
        cancel: CancelSignal::never(),
    };
    let sequencer = RenderSequencer::new(backend.clone());

    let fragments = sequencer.render_all(&ctx, 2, |_| NoopObserver).await.unwrap();
    assert_eq!(fragments, vec![workdir.fragment_path(2, &ctx.scheme)]);
    assert_eq!(backend.invocations().len(), 1);

    let none = sequencer.render_all(&ctx, 5, |_| NoopObserver).await.unwrap();
    assert!(none.is_empty());
    assert_eq!(backend.invocations().len(), 1);
}
