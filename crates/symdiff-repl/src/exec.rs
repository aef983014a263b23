use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use lazy_regex::regex_is_match;
use log::debug;

use symdiff::Session;
use symdiff::display::PrintOptions;
use symdiff::eval::{EvalResult, Unresolved};
use symdiff::tree::OpKind;
use symdiff::variables::VariableTable;
use symdiff_plot::{Plot2DOptions, plot_session};
use symdiff_utils::derivative_label;

use crate::error::{report_error, report_parse_error};
use crate::resolve::Prompt;

pub struct ExecContext {
    pub is_repl: bool,
    pub debug_mode: bool,
    pub unicode_exponents: bool,
    /// Ask on stdin for unbound variables, otherwise they evaluate to NaN
    pub prompt_unbound: bool,
    pub order: usize,
    pub range: (f64, f64),
    pub samples: usize,
    pub plot_path: PathBuf,
    /// Values bound with `:=`, copied into every new session
    pub vars: VariableTable,
    pub session: Option<Session>,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self {
            is_repl: false,
            debug_mode: false,
            unicode_exponents: false,
            prompt_unbound: true,
            order: 1,
            range: (-5.0, 5.0),
            samples: 1000,
            plot_path: PathBuf::from("symdiff_plot.svg"),
            vars: VariableTable::new(),
            session: None,
        }
    }
}

impl ExecContext {
    fn print_options(&self) -> PrintOptions {
        PrintOptions {
            unicode_exponents: self.unicode_exponents,
        }
    }

    fn evaluate(&self, session: &mut Session) -> EvalResult<f64> {
        if self.prompt_unbound {
            session.evaluate(&mut Prompt::stdin())
        } else {
            session.evaluate(&mut Unresolved)
        }
    }
}

pub fn exec_file(path: &Path, exec_ctx: &mut ExecContext) -> std::io::Result<()> {
    let file = File::open(path)?;
    exec_reader(BufReader::new(file), exec_ctx)
}

pub fn exec_reader(reader: impl BufRead, exec_ctx: &mut ExecContext) -> std::io::Result<()> {
    for res in reader.lines() {
        let line = res?;
        if let Some(string) = line.strip_prefix("!") {
            println!("{}", string.trim());
            continue;
        }

        match exec_line(&line, exec_ctx) {
            Some(ExecResult::Error | ExecResult::Exit) => return Ok(()),
            None => (),
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExecResult {
    Exit,
    Error,
}

pub fn exec_line(mut line: &str, exec_ctx: &mut ExecContext) -> Option<ExecResult> {
    if let Some(remainder) = line.strip_prefix(":") {
        return eval_command(remainder, exec_ctx);
    }

    if let Some((body, _comment)) = line.split_once('#') {
        line = body;
    }
    if line.trim().is_empty() {
        return None;
    }

    if let Some((head, tail)) = line.split_once(":=") {
        define(head.trim(), tail, exec_ctx)
    } else {
        exec_expression(line, exec_ctx)
    }
}

fn define(name: &str, source: &str, exec_ctx: &mut ExecContext) -> Option<ExecResult> {
    if !regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*$", name) || OpKind::from_keyword(name).is_some()
    {
        println!("Invalid variable name: {name}");
        return Some(ExecResult::Error);
    }

    let mut session = match Session::parse_with(source, exec_ctx.vars.clone()) {
        Ok(session) => session,
        Err(err) => {
            report_parse_error(&err, source);
            return Some(ExecResult::Error);
        }
    };
    let value = match exec_ctx.evaluate(&mut session) {
        Ok(value) if value.is_nan() => {
            println!("Error: {name} would not be a number");
            return Some(ExecResult::Error);
        }
        Ok(value) => value,
        Err(err) => {
            report_error(&err);
            return Some(ExecResult::Error);
        }
    };

    let bound = exec_ctx.vars.set_value(name, value).and_then(|_| {
        match &mut exec_ctx.session {
            Some(current) => current.vars_mut().set_value(name, value).map(|_| ()),
            None => Ok(()),
        }
    });
    if let Err(err) = bound {
        report_error(&err);
        return Some(ExecResult::Error);
    }
    if exec_ctx.is_repl {
        println!("Defined variable {name} = {value}");
    }
    None
}

fn exec_expression(line: &str, exec_ctx: &mut ExecContext) -> Option<ExecResult> {
    let mut session = match Session::parse_with(line, exec_ctx.vars.clone()) {
        Ok(session) => session,
        Err(err) => {
            report_parse_error(&err, line);
            return Some(ExecResult::Error);
        }
    };

    let opts = exec_ctx.print_options();
    if exec_ctx.debug_mode {
        println!("Tree: {:?}", session.expression());
        println!("Nodes: {}", session.expression().size());
        println!();
    }
    println!("{}", session.expression().display_opts(session.vars(), opts));

    match exec_ctx.evaluate(&mut session) {
        Ok(value) => println!("= {value}"),
        Err(err) => {
            report_error(&err);
            return Some(ExecResult::Error);
        }
    }

    exec_ctx.session = Some(session);
    None
}

fn eval_command(command: &str, exec_ctx: &mut ExecContext) -> Option<ExecResult> {
    let Some(kind) = command.chars().next() else {
        return None;
    };
    let args = command[kind.len_utf8()..].split_whitespace().collect_vec();

    let ok = match kind {
        'q' => return Some(ExecResult::Exit),
        'h' => {
            print_help(args.first().copied().unwrap_or_default());
            true
        }
        'l' => {
            list_definitions(exec_ctx);
            true
        }
        's' => update_settings(&args, exec_ctx),
        'r' => {
            exec_ctx.vars = VariableTable::new();
            exec_ctx.session = None;
            true
        }
        'd' => differentiate(&args, exec_ctx),
        't' => taylor(&args, exec_ctx),
        'p' => plot(&args, exec_ctx),
        'e' => match args.first() {
            Some(name) => {
                if exec_file(Path::new(name), exec_ctx).is_err() {
                    println!("Cannot open file");
                }
                true
            }
            None => {
                println!("Usage: :e <file>");
                false
            }
        },
        _ => {
            println!("Unknown command type {kind}. Ignoring");
            true
        }
    };

    if ok { None } else { Some(ExecResult::Error) }
}

fn current_session(exec_ctx: &mut ExecContext) -> Option<&mut Session> {
    if exec_ctx.session.is_none() {
        println!("No expression yet, type one first");
    }
    exec_ctx.session.as_mut()
}

/// First unbound variable the expression mentions, else the first one it mentions at all.
fn default_variable(session: &Session) -> Option<String> {
    let root = session.expression().root()?;
    let mentioned = session
        .vars()
        .iter()
        .filter(|var| {
            session
                .expression()
                .contains_variable(root, var.index)
                .unwrap_or(false)
        })
        .collect_vec();
    mentioned
        .iter()
        .find(|var| !var.is_bound())
        .or_else(|| mentioned.first())
        .map(|var| var.name.clone())
}

fn differentiate(args: &[&str], exec_ctx: &mut ExecContext) -> bool {
    let mut var = None;
    let mut times = exec_ctx.order;
    for arg in args {
        match arg.parse::<usize>() {
            Ok(n) => times = n,
            Err(_) => var = Some((*arg).to_owned()),
        }
    }

    let opts = exec_ctx.print_options();
    let Some(session) = current_session(exec_ctx) else {
        return false;
    };
    let Some(var) = var.or_else(|| default_variable(session)) else {
        println!("The expression has no variable to differentiate by");
        return false;
    };
    if !regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*$", &var) {
        println!("Invalid variable name: {var}");
        return false;
    }

    if let Err(err) = session.differentiate(&var, times) {
        report_error(&err);
        return false;
    }
    debug!("differentiated {times} times by {var}");

    for (order, tree) in (1..).zip(session.derivatives()) {
        println!(
            "{}({var}) = {}",
            derivative_label("f", order),
            tree.display_opts(session.vars(), opts)
        );
    }
    true
}

fn taylor(args: &[&str], exec_ctx: &mut ExecContext) -> bool {
    let Some(point) = args.first().and_then(|arg| arg.parse::<f64>().ok()) else {
        println!("Usage: :t <point>");
        return false;
    };
    let opts = exec_ctx.print_options();
    let Some(session) = current_session(exec_ctx) else {
        return false;
    };

    match session.taylor(point) {
        Ok(poly) => {
            let var = session.var_to_diff().map_or("x", |var| var.name.as_str());
            println!(
                "T{}({var}) = {}",
                session.derivatives().len(),
                poly.display_opts(session.vars(), opts)
            );
            true
        }
        Err(symdiff::Error::NotDifferentiated) => {
            println!("Differentiate first with :d");
            false
        }
        Err(err) => {
            report_error(&err);
            false
        }
    }
}

fn plot(args: &[&str], exec_ctx: &mut ExecContext) -> bool {
    let path = args
        .first()
        .map_or_else(|| exec_ctx.plot_path.clone(), PathBuf::from);
    let opts = Plot2DOptions {
        range: exec_ctx.range.0..exec_ctx.range.1,
        samples: exec_ctx.samples,
        ..Default::default()
    };
    let Some(session) = current_session(exec_ctx) else {
        return false;
    };
    if session.var_to_diff().is_none() {
        println!("Differentiate first with :d");
        return false;
    }

    match plot_session(&path, session, &opts) {
        Ok(()) => {
            println!("Plotted to {}", path.display());
            true
        }
        Err(err) => {
            report_error(&err);
            false
        }
    }
}

fn list_definitions(exec_ctx: &ExecContext) {
    println!("\nBound:");
    for var in exec_ctx.vars.iter().sorted_by_key(|var| &var.name) {
        println!("   {var}");
    }

    if let Some(session) = &exec_ctx.session {
        println!("\nCurrent expression:");
        for var in session.vars().iter().sorted_by_key(|var| &var.name) {
            println!("   {var}");
        }
    }
}

fn update_settings(args: &[&str], exec_ctx: &mut ExecContext) -> bool {
    let parsed = |i: usize| args.get(i).and_then(|arg| arg.parse::<f64>().ok());
    match args {
        ["debug"] => exec_ctx.debug_mode = true,
        ["normal"] => exec_ctx.debug_mode = false,
        ["unicode"] => exec_ctx.unicode_exponents = true,
        ["ascii"] => exec_ctx.unicode_exponents = false,
        ["prompt"] => exec_ctx.prompt_unbound = true,
        ["noprompt"] => exec_ctx.prompt_unbound = false,
        ["order", n] => match n.parse() {
            Ok(order) => exec_ctx.order = order,
            Err(_) => {
                println!("Order must be a non-negative integer");
                return false;
            }
        },
        ["samples", n] => match n.parse::<usize>() {
            Ok(samples) if samples >= 2 => exec_ctx.samples = samples,
            _ => {
                println!("Samples must be an integer of at least 2");
                return false;
            }
        },
        ["range", _, _] => match (parsed(1), parsed(2)) {
            (Some(low), Some(high)) if low < high => exec_ctx.range = (low, high),
            _ => {
                println!("Range needs two numbers, the lower one first");
                return false;
            }
        },
        ["path", path] => exec_ctx.plot_path = PathBuf::from(*path),
        _ => {
            println!("Unknown setting");
            return false;
        }
    }
    true
}

fn print_help(arg: &str) {
    if arg.is_empty() {
        println!(
            "symdiff, symbolic differentiation of infix expressions

Type an expression to parse, print and evaluate it.
Use name := expression to bind a value to a variable.
For a complete list of commands, type :h commands
For a function, type :h <name>, for example :h arcctg"
        );
        return;
    }

    if arg == "commands" {
        println!(
            ":d [var] [n]      differentiate the last expression n times
:t <point>        Taylor polynomial from the computed derivatives
:p [path]         plot the expression and its derivatives to SVG
:l                list variables
:r                forget all variables and the last expression
:s <setting>      debug | normal | unicode | ascii | prompt | noprompt
                  order N | samples N | range A B | path P
:e <file>         execute a script
:h [topic]        this help
:q                quit"
        );
        return;
    }

    match OpKind::from_keyword(arg) {
        Some(op) => {
            let usage = if op.is_binary() {
                format!("{arg}(base, x)")
            } else {
                format!("{arg}(x)")
            };
            println!("Usage: {usage}");
            println!("LaTeX: {}", op.latex_template());
        }
        None => println!("No help for {arg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn context() -> ExecContext {
        ExecContext {
            prompt_unbound: false,
            ..Default::default()
        }
    }

    fn run(lines: &[&str], exec_ctx: &mut ExecContext) {
        for line in lines {
            assert_eq!(exec_line(line, exec_ctx), None, "{line}");
        }
    }

    #[test]
    fn definitions_bind_values() {
        let mut exec_ctx = context();
        run(&["a := 2 * 3", "b := a + 1 # seven"], &mut exec_ctx);
        assert_eq!(exec_ctx.vars.find_by_name("a").unwrap().value, 6.0);
        assert_eq!(exec_ctx.vars.find_by_name("b").unwrap().value, 7.0);

        assert_eq!(exec_line("sin := 1", &mut exec_ctx), Some(ExecResult::Error));
        assert_eq!(exec_line("c := q", &mut exec_ctx), Some(ExecResult::Error));
        assert_eq!(exec_line("c := 1 +", &mut exec_ctx), Some(ExecResult::Error));
    }

    #[test]
    fn expressions_become_the_session() {
        let mut exec_ctx = context();
        run(&["k := 3", "k * x^2", ":d 2"], &mut exec_ctx);

        let session = exec_ctx.session.as_ref().unwrap();
        assert_eq!(session.var_to_diff().unwrap().name, "x");
        let second = session.derivative(2).unwrap();
        let x = session.vars().index_of("x").unwrap();
        assert_relative_eq!(second.evaluate_at(session.vars(), x, 1.0).unwrap(), 6.0);
    }

    #[test]
    fn default_variable_prefers_unbound() {
        let mut exec_ctx = context();
        run(&["k := 3", "x * k"], &mut exec_ctx);
        let session = exec_ctx.session.as_ref().unwrap();
        assert_eq!(default_variable(session).as_deref(), Some("x"));

        run(&["x := 2", "k * x + 1"], &mut exec_ctx);
        let session = exec_ctx.session.as_ref().unwrap();
        assert_eq!(default_variable(session).as_deref(), Some("k"));

        run(&["5"], &mut exec_ctx);
        assert_eq!(default_variable(exec_ctx.session.as_ref().unwrap()), None);
    }

    #[test]
    fn commands() {
        let mut exec_ctx = context();
        assert_eq!(exec_line(":d", &mut exec_ctx), Some(ExecResult::Error));
        run(
            &["", "# nothing", ":s order 3", ":s range -1 2", "sin(t)", ":d t", ":t 0"],
            &mut exec_ctx,
        );
        assert_eq!(exec_ctx.order, 3);
        assert_eq!(exec_ctx.range, (-1.0, 2.0));
        assert_eq!(exec_ctx.session.as_ref().unwrap().derivatives().len(), 3);

        assert_eq!(exec_line(":s range 2 1", &mut exec_ctx), Some(ExecResult::Error));
        assert_eq!(exec_line(":s colour", &mut exec_ctx), Some(ExecResult::Error));
        assert_eq!(exec_line(":t", &mut exec_ctx), Some(ExecResult::Error));
        assert_eq!(exec_line(":z", &mut exec_ctx), None);
        assert_eq!(exec_line(":q", &mut exec_ctx), Some(ExecResult::Exit));

        run(&[":r"], &mut exec_ctx);
        assert!(exec_ctx.session.is_none());
    }

    #[test]
    fn scripts_stop_at_the_first_error() {
        let mut exec_ctx = context();
        let script = "!comment\nx := 1\n2 +* x\ny := 2\n";
        exec_reader(script.as_bytes(), &mut exec_ctx).unwrap();
        assert!(exec_ctx.vars.find_by_name("x").is_some());
        assert!(exec_ctx.vars.find_by_name("y").is_none());
    }
}
