use ariadne::{Color, Label, Report, ReportKind, Source};
use symdiff::parse::ParseError;

/// Prints `err` to stderr, pointing at the offending byte of `input` when there is one.
pub fn report_parse_error(err: &ParseError, input: &str) {
    let Some(position) = err.position() else {
        println!("Error: {err}");
        return;
    };

    // An error at the end of input still needs a visible span
    let start = position.min(input.len());
    let end = input[start..]
        .chars()
        .next()
        .map_or(start + 1, |c| start + c.len_utf8());

    let message = match err {
        ParseError::Syntax { kind, .. } => format!("expected {kind}"),
        ParseError::Tree(err) => err.to_string(),
    };
    let report = Report::build(ReportKind::Error, "input", start)
        .with_message("could not parse expression")
        .with_label(
            Label::new(("input", start..end))
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish();

    if report.eprint(("input", Source::from(input))).is_err() {
        println!("Error: {err}");
    }
}

/// Prints any other error the way every command reports failures.
pub fn report_error(err: &impl std::fmt::Display) {
    println!("Error: {err}");
}
