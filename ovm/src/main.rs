use clap::Parser as ClapParser;
use std::io::{self, Write};
use thiserror::Error;

use ovm::{
    ErrorKind, NUM_REGS, ObjType, Op, Ovm, OvmCreateInfo, R0, R1, TOSTRING_FORMAT,
    split_top_level, trim,
};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Expressions of the form `subject ; op arg ... ; op ...`
    #[arg(required = false, help = "Expressions to evaluate in order")]
    exprs: Vec<String>,

    /// Start REPL after evaluating expressions (default if none given)
    #[arg(long, help = "Force REPL mode after evaluation")]
    repl: bool,

    #[arg(long, default_value_t = 1024, help = "Object pool slots")]
    pool_size: usize,

    #[arg(long, default_value_t = 256, help = "Operand stack slots")]
    stack_size: usize,

    #[arg(long, default_value_t = 16, help = "Work area slots")]
    work_size: usize,

    #[arg(long, help = "printf-style template for integers, e.g. %#x")]
    int_format: Option<String>,

    #[arg(long, help = "printf-style template for floats, e.g. %.3f")]
    float_format: Option<String>,
}

#[derive(Debug, Error)]
enum EvalError {
    #[error("{0}")]
    Vm(#[from] ErrorKind),
    #[error("{0}")]
    UnknownOp(String),
    #[error("missing operation")]
    MissingOp,
    #[error("at most {} operands", NUM_REGS - 1)]
    TooManyOperands,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut vm = Ovm::new(OvmCreateInfo {
        pool_size: cli.pool_size,
        work_size: cli.work_size,
        stack_size: cli.stack_size,
    });
    configure(&mut vm, ObjType::Integer, cli.int_format.as_deref());
    configure(&mut vm, ObjType::Float, cli.float_format.as_deref());

    for expr in &cli.exprs {
        report(&mut vm, expr);
    }

    if cli.repl || cli.exprs.is_empty() {
        run_repl(&mut vm);
    }
}

fn configure(vm: &mut Ovm, ty: ObjType, template: Option<&str>) {
    let Some(template) = template else {
        return;
    };
    vm.newc_str(R0, template);
    vm.set_class_config(ty, TOSTRING_FORMAT, R0);
    vm.newc_nil(R0);
    if let Err(err) = vm.take_error() {
        eprintln!("Error setting {ty} format: {err}");
    }
}

fn run_repl(vm: &mut Ovm) {
    println!("ovm REPL");
    println!("Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input_buffer = String::new();

    loop {
        print!("> ");
        if let Err(err) = stdout.flush() {
            eprintln!("Error flushing stdout: {err}");
            break;
        }

        input_buffer.clear();
        match stdin.read_line(&mut input_buffer) {
            Ok(0) => break,
            Ok(_) => {
                let input = input_buffer.trim();
                if input == "exit" {
                    break;
                }
                if input.is_empty() {
                    continue;
                }
                report(vm, input);
            }
            Err(err) => {
                eprintln!("Error reading input: {err}");
                break;
            }
        }
    }
}

fn report(vm: &mut Ovm, expr: &str) {
    match evaluate(vm, expr) {
        Ok(literal) => println!("{literal}"),
        Err(err) => println!("error: {err}"),
    }
}

/// Parses the subject into R0, then applies each `op arg ...` step with the
/// operands in R1 upwards.
fn evaluate(vm: &mut Ovm, expr: &str) -> Result<String, EvalError> {
    let steps = split_top_level(expr.as_bytes(), b';');
    let (subject, ops) = steps.split_first().ok_or(EvalError::MissingOp)?;
    vm.news(R0, &String::from_utf8_lossy(subject));
    vm.take_error()?;

    for step in ops {
        let words = words(step);
        let (name, operands) = words.split_first().ok_or(EvalError::MissingOp)?;
        let op: Op = String::from_utf8_lossy(name)
            .parse()
            .map_err(EvalError::UnknownOp)?;
        if operands.len() >= NUM_REGS {
            return Err(EvalError::TooManyOperands);
        }
        let regs: Vec<usize> = (R1..R1 + operands.len()).collect();
        for (&r, text) in regs.iter().zip(operands) {
            vm.news(r, &String::from_utf8_lossy(text));
        }
        vm.call(R0, op, &regs);
        vm.take_error()?;
    }

    Ok(vm.to_literal(R0)?)
}

/// Whitespace-separated words, keeping bracketed and quoted text whole.
fn words(step: &[u8]) -> Vec<&[u8]> {
    split_top_level(trim(step), b' ')
        .into_iter()
        .map(trim)
        .filter(|w| !w.is_empty())
        .collect()
}
