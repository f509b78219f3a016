//! Command-line front end: evaluate expressions, run scripts, keep state.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rpl_core::render::{render, Renderer};
use rpl_core::{eval, state, Runtime};

#[derive(Parser)]
#[command(name = "rpl", about = "Scientific RPL calculator", version)]
struct Args {
    /// Object memory size in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    memory: usize,

    /// State file to load before evaluating.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Write the state back to this file on exit.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Expressions to evaluate; read stdin as a REPL when absent.
    exprs: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let mut rt = Runtime::new(args.memory);

    if let Some(path) = &args.state {
        if let Err(e) = state::load_from(&mut rt, path) {
            eprintln!("error loading {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let mut failed = false;
    if args.exprs.is_empty() {
        repl(&mut rt);
    } else {
        for expr in &args.exprs {
            if let Err(e) = eval::eval_text(&mut rt, expr) {
                eprintln!("error: {e}");
                failed = true;
                break;
            }
        }
        print_stack(&rt);
    }

    if let Some(path) = &args.save {
        if let Err(e) = state::save_to(&rt, path) {
            eprintln!("error saving {}: {e}", path.display());
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn repl(rt: &mut Runtime) {
    let stdin = io::stdin();
    let mut out = io::stdout();
    loop {
        print!("> ");
        let _ = out.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match eval::eval_text(rt, line) {
            Ok(()) => print_stack(rt),
            Err(e) => eprintln!("error: {e}"),
        }
    }
}

fn print_stack(rt: &Runtime) {
    let renderer = Renderer::stack(rt);
    for level in (0..rt.depth()).rev() {
        let obj = rt.stack_get(level).expect("level bounded by depth");
        println!("{}: {}", level + 1, render(rt, obj, &renderer));
    }
}
