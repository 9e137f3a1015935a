mod common;

use common::{FakeRunner, Harness};
use pdf2zh_pipeline::{DualLayout, PipelineError, PipelineStage, TranslationConfig};
use std::sync::Mutex;

fn pdf2zh() -> TranslationConfig {
    TranslationConfig {
        engine: "pdf2zh".into(),
        ..Default::default()
    }
}

fn next(layout: DualLayout) -> TranslationConfig {
    TranslationConfig {
        engine: "pdf2zh_next".into(),
        dual_mode: layout,
        ..Default::default()
    }
}

#[test]
fn translate_pdf2zh_returns_mono_then_dual() {
    let h = Harness::new();
    let input = h.document("paper.pdf");

    let out = h.pipeline.translate(&input, &pdf2zh()).unwrap();

    assert_eq!(out.names(), vec!["paper-mono.pdf", "paper-dual.pdf"]);
    assert_eq!(h.commands().len(), 1);
    assert!(h.calls().is_empty());
}

#[test]
fn translate_pdf2zh_runs_derived_steps_in_order() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        mono_cut: true,
        dual_cut: true,
        crop_compare: true,
        compare: true,
        ..pdf2zh()
    };

    let out = h.pipeline.translate(&input, &req).unwrap();

    assert_eq!(
        out.names(),
        vec![
            "paper-mono.pdf",
            "paper-dual.pdf",
            "paper-mono-cut.pdf",
            "paper-dual-cut.pdf",
            "paper-crop-compare.pdf",
            "paper-compare.pdf",
        ]
    );
    assert_eq!(
        h.calls(),
        vec![
            "crop paper-mono.pdf mono -> paper-mono-cut.pdf mono-cut",
            "crop paper-dual.pdf dual -> paper-dual-cut.pdf dual-cut",
            "crop paper-dual.pdf dual -> paper-crop-compare.pdf crop-compare",
            "merge paper-dual.pdf -> paper-compare.pdf",
        ]
    );
}

#[test]
fn translate_next_tb_renames_dual_before_cropping() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        dual_cut: true,
        ..next(DualLayout::Tb)
    };

    let out = h.pipeline.translate(&input, &req).unwrap();

    assert_eq!(
        out.names(),
        vec![
            "paper.zh-CN.mono.pdf",
            "paper.zh-CN.TB_dual.pdf",
            "paper.zh-CN.TB_dual.cut.pdf",
        ]
    );
    assert!(!h.dir.path().join("paper.zh-CN.dual.pdf").exists());
    assert!(h.commands()[0].has_arg("--use-alternating-pages-dual"));
}

#[test]
fn translate_next_lr_compare_needs_no_merge() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        compare: true,
        ..next(DualLayout::Lr)
    };

    let out = h.pipeline.translate(&input, &req).unwrap();

    assert_eq!(
        out.names(),
        vec!["paper.zh-CN.mono.pdf", "paper.zh-CN.LR_dual.pdf"]
    );
    assert!(h.calls().is_empty());
}

#[test]
fn translate_next_lr_crops_an_alternating_copy() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        dual_cut: true,
        no_watermark: true,
        ..next(DualLayout::Lr)
    };

    let out = h.pipeline.translate(&input, &req).unwrap();

    assert_eq!(
        out.names(),
        vec![
            "paper.no_watermark.zh-CN.mono.pdf",
            "paper.no_watermark.zh-CN.LR_dual.pdf",
            "paper.no_watermark.zh-CN.TB_dual.cut.pdf",
        ]
    );
    assert_eq!(
        h.calls(),
        vec![
            "relayout paper.no_watermark.zh-CN.LR_dual.pdf LR -> paper.no_watermark.zh-CN.TB_dual.pdf TB",
            "crop paper.no_watermark.zh-CN.TB_dual.pdf dual -> paper.no_watermark.zh-CN.TB_dual.cut.pdf dual-cut",
        ]
    );
}

#[test]
fn translate_next_mono_cut_overrides_no_mono() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        no_mono: true,
        mono_cut: true,
        ..next(DualLayout::Lr)
    };

    let out = h.pipeline.translate(&input, &req).unwrap();

    assert_eq!(
        out.names(),
        vec![
            "paper.zh-CN.mono.pdf",
            "paper.zh-CN.dual.pdf",
            "paper.zh-CN.mono.cut.pdf",
        ]
    );
    assert!(!h.commands()[0].has_arg("--no-mono"));
}

#[test]
fn translate_rejects_derived_input_before_running_anything() {
    let h = Harness::new();
    let input = h.document("paper-mono.pdf");

    let err = h.pipeline.translate(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InvalidSourceStage {
            stage: PipelineStage::Mono,
            ..
        }
    ));
    assert!(h.commands().is_empty());
}

#[test]
fn compare_next_lr_returns_the_dual_unmerged() {
    let h = Harness::new();
    let input = h.document("paper.pdf");

    let out = h.pipeline.compare(&input, &next(DualLayout::Lr)).unwrap();

    assert_eq!(out.names(), vec!["paper.zh-CN.compare.pdf"]);
    assert!(h.calls().is_empty());
    let cmd = &h.commands()[0];
    assert!(cmd.has_arg("--no-mono"));
    assert!(!cmd.has_arg("--use-alternating-pages-dual"));
    assert!(!h.dir.path().join("paper.zh-CN.dual.pdf").exists());
}

#[test]
fn compare_next_tb_merges_the_dual() {
    let h = Harness::new();
    let input = h.document("paper.pdf");

    let out = h.pipeline.compare(&input, &next(DualLayout::Tb)).unwrap();

    assert_eq!(out.names(), vec!["paper.zh-CN.compare.pdf"]);
    assert_eq!(
        h.calls(),
        vec!["merge paper.zh-CN.dual.pdf -> paper.zh-CN.compare.pdf"]
    );
}

#[test]
fn compare_pdf2zh_translates_then_merges() {
    let h = Harness::new();
    let input = h.document("paper.pdf");

    let out = h.pipeline.compare(&input, &pdf2zh()).unwrap();

    assert_eq!(out.names(), vec!["paper-compare.pdf"]);
    assert_eq!(h.calls(), vec!["merge paper-dual.pdf -> paper-compare.pdf"]);
}

#[test]
fn compare_on_dual_merges_without_translating() {
    let h = Harness::new();
    let input = h.document("paper-dual.pdf");

    let out = h.pipeline.compare(&input, &pdf2zh()).unwrap();

    assert_eq!(out.names(), vec!["paper-compare.pdf"]);
    assert!(h.commands().is_empty());
}

#[test]
fn crop_on_compare_is_rejected() {
    let h = Harness::new();
    let input = h.document("paper-compare.pdf");

    let err = h.pipeline.crop(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InvalidSourceStage {
            stage: PipelineStage::Compare,
            ..
        }
    ));
    assert!(h.calls().is_empty());
}

#[test]
fn crop_names_are_deterministic() {
    let h = Harness::new();
    let input = h.document("paper-dual.pdf");

    let first = h.pipeline.crop(&input, &pdf2zh()).unwrap();
    let second = h.pipeline.crop(&input, &pdf2zh()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.names(), vec!["paper-dual-cut.pdf"]);
    assert_eq!(h.calls().len(), 2);
}

#[test]
fn crop_origin_uses_the_cut_shorthand() {
    let h = Harness::new();
    let input = h.document("paper.pdf");

    let out = h.pipeline.crop(&input, &next(DualLayout::Lr)).unwrap();

    assert_eq!(out.names(), vec!["paper.cut.pdf"]);
    assert!(h.commands().is_empty());
}

#[test]
fn crop_compare_from_dual_cut_only_merges() {
    let h = Harness::new();
    let input = h.document("paper-dual-cut.pdf");

    let out = h.pipeline.crop_compare(&input, &pdf2zh()).unwrap();

    assert_eq!(out.names(), vec!["paper-crop-compare.pdf"]);
    assert_eq!(
        h.calls(),
        vec!["merge paper-dual-cut.pdf -> paper-crop-compare.pdf"]
    );
}

#[test]
fn crop_compare_from_origin_translates_a_tb_dual() {
    let h = Harness::new();
    let input = h.document("paper.pdf");

    let out = h
        .pipeline
        .crop_compare(&input, &next(DualLayout::Lr))
        .unwrap();

    assert_eq!(out.names(), vec!["paper.zh-CN.crop.compare.pdf"]);
    let cmd = &h.commands()[0];
    assert!(cmd.has_arg("--use-alternating-pages-dual"));
    assert!(cmd.has_arg("--no-mono"));
    assert_eq!(
        h.calls(),
        vec!["crop paper.zh-CN.dual.pdf dual -> paper.zh-CN.crop.compare.pdf crop-compare"]
    );
}

#[test]
fn crop_compare_rejects_mono() {
    let h = Harness::new();
    let input = h.document("paper-mono.pdf");

    let err = h.pipeline.crop_compare(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(err, PipelineError::InvalidSourceStage { .. }));
}

#[test]
fn engine_failure_is_retried_once_with_skip_subset_fonts() {
    let h = Harness::with_runner(|commands| {
        let mut r = FakeRunner::new(commands);
        r.failures = Mutex::new(1);
        r
    });
    let input = h.document("paper.pdf");

    let out = h.pipeline.translate(&input, &pdf2zh()).unwrap();

    assert_eq!(out.len(), 2);
    let cmds = h.commands();
    assert_eq!(cmds.len(), 2);
    assert!(!cmds[0].has_arg("--skip-subset-fonts"));
    assert!(cmds[1].has_arg("--skip-subset-fonts"));
}

#[test]
fn second_engine_failure_is_fatal() {
    let h = Harness::with_runner(|commands| {
        let mut r = FakeRunner::new(commands);
        r.failures = Mutex::new(2);
        r
    });
    let input = h.document("paper.pdf");

    let err = h.pipeline.translate(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(err, PipelineError::ExternalToolFailure { .. }));
    assert_eq!(h.commands().len(), 2);
}

#[test]
fn compare_translation_is_not_retried() {
    let h = Harness::with_runner(|commands| {
        let mut r = FakeRunner::new(commands);
        r.failures = Mutex::new(1);
        r
    });
    let input = h.document("paper.pdf");

    let err = h.pipeline.compare(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(err, PipelineError::ExternalToolFailure { .. }));
    let cmds = h.commands();
    assert_eq!(cmds.len(), 1);
    assert!(!cmds[0].has_arg("--skip-subset-fonts"));
    assert!(h.calls().is_empty());
}

#[test]
fn crop_compare_translation_is_not_retried() {
    let h = Harness::with_runner(|commands| {
        let mut r = FakeRunner::new(commands);
        r.failures = Mutex::new(1);
        r
    });
    let input = h.document("paper.pdf");

    let err = h
        .pipeline
        .crop_compare(&input, &next(DualLayout::Tb))
        .unwrap_err();

    assert!(matches!(err, PipelineError::ExternalToolFailure { .. }));
    assert_eq!(h.commands().len(), 1);
}

#[test]
fn underivable_compare_name_fails_before_translating() {
    let h = Harness::new();
    let input = h.document("crop.pdf");

    let err = h.pipeline.compare(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(h.commands().is_empty());
    assert!(h.calls().is_empty());
}

#[test]
fn underivable_translate_step_fails_before_translating() {
    let h = Harness::new();
    let input = h.document("photo-crop.pdf");
    let req = TranslationConfig {
        compare: true,
        ..pdf2zh()
    };

    let err = h.pipeline.translate(&input, &req).unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(h.commands().is_empty());
    assert!(!h.dir.path().join("photo-crop-mono.pdf").exists());
}

#[test]
fn crop_stem_is_derivable_once_the_dual_has_a_layout_prefix() {
    let h = Harness::new();
    let input = h.document("crop.pdf");
    let req = TranslationConfig {
        compare: true,
        ..next(DualLayout::Tb)
    };

    // names are checked on the files the engine writes, not on the input stem
    let out = h.pipeline.translate(&input, &req).unwrap();
    assert_eq!(out.names().last().unwrap(), "crop.zh-CN.TB_compare.pdf");
}

#[test]
fn missing_engine_output_is_reported() {
    let h = Harness::with_runner(|commands| {
        let mut r = FakeRunner::new(commands);
        r.produce = false;
        r
    });
    let input = h.document("paper.pdf");

    let err = h.pipeline.translate(&input, &pdf2zh()).unwrap_err();

    match err {
        PipelineError::ArtifactMissing { path } => {
            assert_eq!(path.file_name().unwrap(), "paper-mono.pdf")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn skip_last_pages_becomes_a_page_range() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        skip_last_pages: 2,
        ..next(DualLayout::Lr)
    };

    h.pipeline.translate(&input, &req).unwrap();

    let cmd = &h.commands()[0];
    let pos = cmd.args.iter().position(|a| a == "--pages").unwrap();
    assert_eq!(cmd.args[pos + 1], "1-8");
}

#[test]
fn skipping_every_page_is_rejected() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        skip_last_pages: 10,
        ..pdf2zh()
    };

    let err = h.pipeline.translate(&input, &req).unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(h.commands().is_empty());
}

#[test]
fn unsupported_engine_is_rejected() {
    let h = Harness::new();
    let input = h.document("paper.pdf");
    let req = TranslationConfig {
        engine: "deepl-cli".into(),
        ..Default::default()
    };

    let err = h.pipeline.translate(&input, &req).unwrap_err();

    assert!(matches!(err, PipelineError::UnsupportedEngine(name) if name == "deepl-cli"));
}

#[test]
fn unregistered_adapter_is_unknown_engine() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paper.pdf");
    std::fs::write(&input, common::FAKE_PDF).unwrap();
    let tools = common::FakeTools {
        calls: Default::default(),
        pages: 1,
    };
    let pipeline = pdf2zh_pipeline::Pipeline::new(Box::new(tools));

    let err = pipeline.translate(&input, &pdf2zh()).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::UnknownEngine(pdf2zh_pipeline::EngineKind::Pdf2zh)
    ));
}
