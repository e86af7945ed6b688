use std::path::PathBuf;
use std::time::Duration;

use boundary_app::cli::CliArgs;
use boundary_logging::LogDestination;
use clap::error::ErrorKind;
use clap::Parser;
use log::LevelFilter;
use pretty_assertions::assert_eq;

fn parse<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("boundary_app").chain(args))
}

#[test]
fn positional_files_with_defaults() {
    let args = parse(["page.html", "rules.json"]).expect("valid args");
    assert_eq!(args.page, PathBuf::from("page.html"));
    assert_eq!(args.boundaries, PathBuf::from("rules.json"));
    assert_eq!(args.url, None);
    assert_eq!(args.settings, None);
    assert_eq!(args.scroll, None);
    assert_eq!(args.timeout(), Duration::from_secs(30));
    assert_eq!(args.log, LogDestination::Terminal);
    assert_eq!(args.log_level(), LevelFilter::Warn);
}

#[test]
fn every_option_is_read() {
    let args = parse([
        "--url",
        "http://site.test/page",
        "page.html",
        "--settings",
        "engine.ron",
        "rules.json",
        "--scroll",
        "1200.5",
        "--timeout-ms",
        "250",
        "--log",
        "both",
        "-v",
    ])
    .expect("valid args");

    assert_eq!(args.url.as_deref(), Some("http://site.test/page"));
    assert_eq!(args.settings, Some(PathBuf::from("engine.ron")));
    assert_eq!(args.scroll, Some(1200.5));
    assert_eq!(args.timeout(), Duration::from_millis(250));
    assert_eq!(args.log, LogDestination::Both);
    assert_eq!(args.log_level(), LevelFilter::Debug);
    assert_eq!(args.page, PathBuf::from("page.html"));
    assert_eq!(args.boundaries, PathBuf::from("rules.json"));
}

#[test]
fn long_verbose_and_file_logging() {
    let args = parse(["a", "b", "--verbose", "--log", "file"]).expect("valid args");
    assert_eq!(args.log, LogDestination::File);
    assert_eq!(args.log_level(), LevelFilter::Debug);
}

#[test]
fn bad_arguments_are_rejected() {
    let kind = |args: &[&str]| parse(args.iter().copied()).unwrap_err().kind();

    assert_eq!(kind(&["page.html"]), ErrorKind::MissingRequiredArgument);
    assert_eq!(kind(&["a", "b", "c"]), ErrorKind::UnknownArgument);
    assert_eq!(kind(&["a", "b", "--url"]), ErrorKind::InvalidValue);
    assert_eq!(kind(&["a", "b", "--timeout-ms", "soon"]), ErrorKind::ValueValidation);
    assert_eq!(kind(&["a", "b", "--scroll", "far"]), ErrorKind::ValueValidation);
    assert_eq!(kind(&["a", "b", "--log", "syslog"]), ErrorKind::ValueValidation);
    assert_eq!(kind(&["a", "b", "--frobnicate"]), ErrorKind::UnknownArgument);
}

#[test]
fn help_is_generated() {
    let err = parse(["--help"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    let help = err.to_string();
    assert!(help.contains("--timeout-ms"));
    assert!(help.contains("--scroll"));
}
