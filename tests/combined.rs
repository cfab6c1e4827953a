mod common;

use depcov::cli::cmd_combined;
use depcov::context::RunContext;
use depcov::model::Counter;
use depcov::report::Style;

#[test]
fn second_pass_does_not_leak_first() {
    let project = common::sample_project();
    let mut ctx = RunContext::from_config(&project.config()).unwrap();

    let first = ctx.run(&project.xml_report, None).unwrap();
    let second = ctx.run(&project.html_report, None).unwrap();
    let third = ctx.run(&project.xml_report, None).unwrap();

    for report in [&first, &second, &third] {
        assert_eq!(report.grand_total.instructions, Counter::new(65, 280));
        assert_eq!(report.overall_total.instructions, Counter::new(90, 380));
        assert_eq!(report.views.len(), 7);
    }
    assert_eq!(first.attribution, third.attribution);
}

#[test]
fn combined_text_output_has_both_passes() {
    let project = common::sample_project();
    let out = cmd_combined(&project.config(), &project.xml_report, &project.html_report).unwrap();

    let xml_at = out.find("== xml pass ==").unwrap();
    let html_at = out.find("== html pass ==").unwrap();
    assert!(xml_at < html_at);
    assert!(out.contains("io.sample:http-client:4.1"));
}

#[test]
fn combined_json_output_is_an_array() {
    let project = common::sample_project();
    let mut config = project.config();
    config.style = Style::Json;
    let out = cmd_combined(&config, &project.xml_report, &project.html_report).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let passes = parsed.as_array().unwrap();
    assert_eq!(passes.len(), 2);
    assert_eq!(passes[0]["format"], "xml");
    assert_eq!(passes[1]["format"], "html");
    assert_eq!(passes[0]["totals"], passes[1]["totals"]);
}

#[test]
fn combined_fails_on_missing_html_report() {
    let project = common::sample_project();
    let missing = project.path().join("missing.html");
    let err = cmd_combined(&project.config(), &project.xml_report, &missing).unwrap_err();
    assert!(format!("{err:#}").contains("missing.html"));
}
